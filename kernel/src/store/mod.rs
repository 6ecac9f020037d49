// Server Store
//
// Authoritative key -> chain mapping. Mutations on one key are serialized;
// mutations on different keys never wait on each other beyond a brief
// shard-map lookup.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::chain::{Chain, ChainOrigin};

mod shard;
mod sharded;
mod slot;
mod swap;

pub use sharded::ShardedServerStore;
pub use swap::SwapServerStore;

/// Cache key as seen by the server.
pub type Key = i64;

/// Sequence number stamped on every installed element. Unique across all
/// keys of one store.
pub type Sequence = u64;

/// Shard count used by `new()` constructors.
pub const DEFAULT_SHARDS: usize = 64;

/// Identity of a store instance, recorded in the chains it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(pub Uuid);

impl StoreId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Store-wide source of element stamps.
///
/// Stamps are never reused, across keys or after a failed swap, so a head
/// can only match a read of that same head.
#[derive(Debug, Default)]
pub(crate) struct Sequencer(AtomicU64);

impl Sequencer {
    /// Reserve `count` consecutive stamps and return the first.
    pub(crate) fn reserve(&self, count: usize) -> Sequence {
        self.0.fetch_add(count as u64, Ordering::Relaxed)
    }
}

/// Result of a `replace_at_head` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReplaceOutcome {
    /// The expected head was replaced. `preserved` elements appended after
    /// the read were kept behind the replacement.
    Replaced { preserved: usize },

    /// The expected head is no longer current; nothing changed.
    Stale,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Capability set shared by every store backend.
///
/// Implementations must:
/// - treat an absent key exactly like a key mapped to an empty chain
/// - perform each mutation as one atomic read-modify-write per key
/// - never edit a chain after handing it out
/// - match `expected` by element sequence, never by payload value
pub trait ServerStore: Send + Sync {
    fn id(&self) -> StoreId;

    /// Current chain for `key`, empty if nothing was ever appended.
    fn get(&self, key: Key) -> Result<Chain, StoreError>;

    fn append(&self, key: Key, payload: &[u8]) -> Result<(), StoreError>;

    /// Append and return the chain as it was immediately before.
    fn get_and_append(&self, key: Key, payload: &[u8]) -> Result<Chain, StoreError>;

    /// Replace the head previously read as `expected` with `replacement`,
    /// keeping anything appended since the read.
    fn replace_at_head(
        &self,
        key: Key,
        expected: &Chain,
        replacement: &Chain,
    ) -> Result<ReplaceOutcome, StoreError>;

    /// Number of keys holding an entry.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn check_key(key: Key) -> Result<(), StoreError> {
    if key < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "key must not be negative, got {key}"
        )));
    }
    Ok(())
}

pub(crate) fn check_compaction(
    store: StoreId,
    key: Key,
    expected: &Chain,
    replacement: &Chain,
) -> Result<(), StoreError> {
    check_key(key)?;

    match expected.origin() {
        Some(origin) if *origin != (ChainOrigin { store, key }) => {
            return Err(StoreError::InvalidArgument(format!(
                "expected chain was read from key {} of store {}, not key {key} of store {}",
                origin.key, origin.store.0, store.0
            )));
        }
        None if !expected.is_empty() => {
            return Err(StoreError::InvalidArgument(
                "expected chain was not read from a store".into(),
            ));
        }
        _ => {}
    }

    if expected.iter().any(|e| e.seq().is_none()) {
        return Err(StoreError::InvalidArgument(
            "expected chain contains elements that were never read from a store".into(),
        ));
    }

    if replacement.is_empty() {
        return Err(StoreError::InvalidArgument(
            "replacement chain must not be empty".into(),
        ));
    }

    Ok(())
}
