use super::{prefix_range, prefix_range_before, KvStore};
use std::collections::BTreeMap;

/// Committed module state held in memory
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix_range(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn last_before(&self, prefix: &[u8], before: Option<&[u8]>) -> Option<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix_range_before(prefix, before))
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone()))
    }
}
