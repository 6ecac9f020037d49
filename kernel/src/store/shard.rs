use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::RwLock;

use super::Key;

/// Key -> slot map split across independently locked shards.
///
/// Shard locks are held only long enough to find or create a slot; all
/// per-key work happens on the returned `Arc<S>` after the shard lock is
/// released.
pub(crate) struct ShardMap<S> {
    shards: Box<[RwLock<FxHashMap<Key, Arc<S>>>]>,
    mask: usize,
}

impl<S: Default> ShardMap<S> {
    /// `shard_count` is rounded up to a power of two.
    pub(crate) fn new(shard_count: usize) -> Self {
        let count = shard_count.max(1).next_power_of_two();
        let shards = (0..count)
            .map(|_| RwLock::new(FxHashMap::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            mask: count - 1,
        }
    }

    fn shard(&self, key: Key) -> &RwLock<FxHashMap<Key, Arc<S>>> {
        &self.shards[fxhash::hash64(&key) as usize & self.mask]
    }

    pub(crate) fn get(&self, key: Key) -> Option<Arc<S>> {
        self.shard(key).read().get(&key).cloned()
    }

    pub(crate) fn get_or_insert(&self, key: Key) -> Arc<S> {
        if let Some(slot) = self.get(key) {
            return slot;
        }

        let mut shard = self.shard(key).write();
        Arc::clone(shard.entry(key).or_default())
    }

    pub(crate) fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }
}
