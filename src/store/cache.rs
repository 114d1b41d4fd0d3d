//! Write-buffering store for a single state transition
//!
//! Reads fall through to the parent; writes stay in memory until the
//! transition succeeds. A failed transition simply drops the cache, so no
//! partial update ever reaches the parent.

use super::{prefix_range, prefix_range_before, ChangeSet, KvStore};
use crate::context::Context;
use crate::events::Event;
use std::collections::BTreeMap;
use tracing::debug;

pub struct CacheStore<'a, S: KvStore> {
    parent: &'a S,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore> CacheStore<'a, S> {
    pub fn new(parent: &'a S) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Consume the cache, returning the buffered writes
    pub fn into_changes(self) -> ChangeSet {
        ChangeSet(self.writes)
    }

    /// Greatest parent entry below `before` that the cache does not override
    fn parent_last_before(&self, prefix: &[u8], before: Option<&[u8]>) -> Option<(Vec<u8>, Vec<u8>)> {
        let mut bound = before.map(<[u8]>::to_vec);
        loop {
            match self.parent.last_before(prefix, bound.as_deref()) {
                Some((key, _)) if self.writes.contains_key(&key) => bound = Some(key),
                other => return other,
            }
        }
    }
}

impl<S: KvStore> KvStore for CacheStore<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.parent.prefix_scan(prefix).into_iter().collect();
        for (key, value) in self.writes.range(prefix_range(prefix)) {
            match value {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }
        merged.into_iter().collect()
    }

    fn last_before(&self, prefix: &[u8], before: Option<&[u8]>) -> Option<(Vec<u8>, Vec<u8>)> {
        let from_parent = self.parent_last_before(prefix, before);
        let from_cache = self
            .writes
            .range(prefix_range_before(prefix, before))
            .rev()
            .find_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.clone())));

        match (from_parent, from_cache) {
            (Some(p), Some(c)) => Some(if p.0 > c.0 { p } else { c }),
            (p, c) => p.or(c),
        }
    }
}

/// Run `f` as one atomic state transition at home height `height`.
///
/// On `Ok` the buffered writes are applied to `store` and the emitted events
/// are returned alongside the closure's value. On `Err` nothing is written.
pub fn run_transition<S, T, E, F>(store: &mut S, height: u64, f: F) -> Result<(T, Vec<Event>), E>
where
    S: KvStore,
    F: FnOnce(&mut Context<CacheStore<'_, S>>) -> Result<T, E>,
{
    let (value, changes, events) = {
        let mut ctx = Context::new(CacheStore::new(&*store), height);
        let value = f(&mut ctx)?;
        let (cache, events) = ctx.into_parts();
        (value, cache.into_changes(), events)
    };

    debug!(height, writes = changes.len(), events = events.len(), "committing transition");
    store.apply(changes);
    Ok((value, events))
}
