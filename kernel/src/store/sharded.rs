// Lock-based backend: one mutex per key slot.

use log::{debug, trace};
use parking_lot::Mutex;

use super::shard::ShardMap;
use super::slot::SlotState;
use super::{
    check_compaction, check_key, Key, ReplaceOutcome, Sequencer, ServerStore, StoreError,
    StoreId, DEFAULT_SHARDS,
};
use crate::chain::{Chain, ChainOrigin};

/// In-memory store holding each key's chain behind its own mutex.
///
/// Every mutation holds the slot mutex across the whole read-modify-write.
pub struct ShardedServerStore {
    id: StoreId,
    slots: ShardMap<Mutex<SlotState>>,
    sequencer: Sequencer,
}

impl ShardedServerStore {
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

impl Default for ShardedServerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStore for ShardedServerStore {
    fn id(&self) -> StoreId {
        self.id
    }

    fn get(&self, key: Key) -> Result<Chain, StoreError> {
        check_key(key)?;
        let chain = match self.slots.get(key) {
            Some(slot) => slot.lock().snapshot(self.origin(key)),
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
        let mut state = slot.lock();

        let previous = state.snapshot(self.origin(key));
        *state = state.appended(payload, self.sequencer.reserve(1));
        trace!("key {key}: appended {} bytes, chain length {}", payload.len(), state.len());

        Ok(previous)
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
        let mut state = slot.lock();

        let first_seq = self.sequencer.reserve(replacement.len());
        match state.replaced_at_head(expected.elements(), replacement.elements(), first_seq) {
            Some((next, preserved)) => {
                *state = next;
                debug!(
                    "key {key}: compacted {} elements into {}, kept {preserved}",
                    expected.len(),
                    replacement.len()
                );
                Ok(ReplaceOutcome::Replaced { preserved })
            }
            None => {
                debug!("key {key}: compaction ignored, stale head");
                Ok(ReplaceOutcome::Stale)
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainBuilder;

    #[test]
    fn get_on_absent_key_does_not_create_entry() {
        let store = ShardedServerStore::with_shards(4);
        assert!(store.get(11).unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_stable_across_later_appends() {
        let store = ShardedServerStore::new();
        store.append(1, b"a").unwrap();
        let snapshot = store.get(1).unwrap();

        store.append(1, b"b").unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.get(1).unwrap().len(), 2);
    }

    #[test]
    fn chain_from_another_key_is_rejected() {
        let store = ShardedServerStore::new();
        store.append(1, b"a").unwrap();
        store.append(2, b"b").unwrap();

        let read = store.get(1).unwrap();
        let replacement = ChainBuilder.from_payloads([&b"c"[..]]);

        let err = store.replace_at_head(2, &read, &replacement).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }
}
