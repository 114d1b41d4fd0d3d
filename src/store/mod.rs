//! Key-Value Store Module
//!
//! All module state lives in one ordered key-value store:
//! - MemStore: the committed state, kept in a BTreeMap
//! - CacheStore: buffers the writes of one transition over a parent store
//! - keys: the persisted key layout
//! - record: tagged encoding of stored records

mod cache;
pub mod keys;
mod memory;
pub mod record;


use std::collections::BTreeMap;
use std::ops::Bound;

pub use cache::{run_transition, CacheStore};
pub use memory::MemStore;

/// Ordered byte-keyed store
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// Every entry whose key starts with `prefix`, ascending by key.
    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Greatest entry under `prefix` whose key is strictly below `before`.
    ///
    /// With `before == None` this is the greatest entry under `prefix`.
    /// Repeated calls passing the previous key walk the prefix in descending
    /// order while leaving the caller free to mutate the store between steps.
    fn last_before(&self, prefix: &[u8], before: Option<&[u8]>) -> Option<(Vec<u8>, Vec<u8>)>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Write a change set produced by a [`CacheStore`].
    fn apply(&mut self, changes: ChangeSet) {
        for (key, value) in changes.0 {
            match value {
                Some(value) => self.set(key, value),
                None => self.delete(&key),
            }
        }
    }
}

/// Buffered writes; `None` marks a deletion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet(pub BTreeMap<Vec<u8>, Option<Vec<u8>>>);

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Range bounds covering every key that starts with `prefix`
pub(crate) fn prefix_range(prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    (Bound::Included(prefix.to_vec()), prefix_end(prefix))
}

/// Range bounds covering keys under `prefix` that sort strictly below `before`
pub(crate) fn prefix_range_before(
    prefix: &[u8],
    before: Option<&[u8]>,
) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let (start, end) = prefix_range(prefix);
    let Some(before) = before else {
        return (start, end);
    };
    // Clamp into [prefix, prefix_end) so the range never inverts or leaks past the prefix.
    let before = if before < prefix { prefix } else { before };
    match end {
        Bound::Excluded(end) if end.as_slice() < before => (start, Bound::Excluded(end)),
        _ => (start, Bound::Excluded(before.to_vec())),
    }
}

fn prefix_end(prefix: &[u8]) -> Bound<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Bound::Excluded(end);
        }
    }
    Bound::Unbounded
}
