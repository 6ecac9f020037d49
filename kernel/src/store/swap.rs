// Lock-free backend: each key slot is an atomically swapped state.
//
// Readers load the current state without blocking. Writers build the next
// state from the loaded one and publish it with a compare-and-swap,
// retrying from the fresh state if another writer got there first.

use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, trace};

use super::shard::ShardMap;
use super::slot::SlotState;
use super::{
    check_compaction, check_key, Key, ReplaceOutcome, Sequencer, ServerStore, StoreError,
    StoreId, DEFAULT_SHARDS,
};
use crate::chain::{Chain, ChainOrigin};

pub struct SwapServerStore {
    id: StoreId,
    slots: ShardMap<ArcSwap<SlotState>>,
    sequencer: Sequencer,
}

impl SwapServerStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(shard_count: usize) -> Self {
        Self {
            id: StoreId::random(),
            slots: ShardMap::new(shard_count),
            sequencer: Sequencer::default(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.slots.shard_count()
    }

    fn origin(&self, key: Key) -> ChainOrigin {
        ChainOrigin { store: self.id, key }
    }
}

impl Default for SwapServerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStore for SwapServerStore {
    fn id(&self) -> StoreId {
        self.id
    }

    fn get(&self, key: Key) -> Result<Chain, StoreError> {
        check_key(key)?;
        let chain = match self.slots.get(key) {
            Some(slot) => slot.load().snapshot(self.origin(key)),
            None => SlotState::default().snapshot(self.origin(key)),
        };
        Ok(chain)
    }

    fn append(&self, key: Key, payload: &[u8]) -> Result<(), StoreError> {
        self.get_and_append(key, payload).map(drop)
    }

    fn get_and_append(&self, key: Key, payload: &[u8]) -> Result<Chain, StoreError> {
        check_key(key)?;
        let slot = self.slots.get_or_insert(key);

        // `rcu` hands back the state its successful swap replaced.
        let previous = slot.rcu(|current| current.appended(payload, self.sequencer.reserve(1)));
        trace!(
            "key {key}: appended {} bytes, chain length {}",
            payload.len(),
            previous.len() + 1
        );

        Ok(previous.snapshot(self.origin(key)))
    }

    fn replace_at_head(
        &self,
        key: Key,
        expected: &Chain,
        replacement: &Chain,
    ) -> Result<ReplaceOutcome, StoreError> {
        check_compaction(self.id, key, expected, replacement)?;

        let Some(slot) = self.slots.get(key) else {
            debug!("key {key}: compaction ignored, no entry");
            return Ok(ReplaceOutcome::Stale);
        };

        loop {
            let current = slot.load_full();
            let first_seq = self.sequencer.reserve(replacement.len());
            let Some((next, preserved)) =
                current.replaced_at_head(expected.elements(), replacement.elements(), first_seq)
            else {
                debug!("key {key}: compaction ignored, stale head");
                return Ok(ReplaceOutcome::Stale);
            };

            let swapped = slot.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&swapped, &current) {
                debug!(
                    "key {key}: compacted {} elements into {}, kept {preserved}",
                    expected.len(),
                    replacement.len()
                );
                return Ok(ReplaceOutcome::Replaced { preserved });
            }
            trace!("key {key}: compaction raced with a concurrent write, retrying");
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}
