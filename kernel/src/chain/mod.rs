// Chains
//
// Immutable, append-ordered sequences of opaque payloads recorded for a
// single key. A chain handed out by a store is a snapshot: the store never
// edits it afterwards, it only swaps in a new chain for the key.

use serde::{Deserialize, Serialize};
use std::iter::Rev;
use std::slice;
use std::sync::Arc;

use crate::store::{Key, Sequence, StoreId};

pub mod builder;

pub use builder::{ChainBuilder, ElementBuilder};

/// One immutable payload entry within a chain.
///
/// Elements installed by a store carry the store-wide sequence number they
/// were written under. Elements made by [`ElementBuilder`] carry none
/// until a store installs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    payload: Arc<[u8]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq: Option<Sequence>,
}

impl Element {
    pub(crate) fn new(payload: Arc<[u8]>) -> Self {
        Self { payload, seq: None }
    }

    /// Copy of this element carrying `seq`. The payload is shared.
    pub(crate) fn stamped(&self, seq: Sequence) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            seq: Some(seq),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Sequence number assigned by the store that installed this element.
    pub fn seq(&self) -> Option<Sequence> {
        self.seq
    }
}

/// Where a chain snapshot was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOrigin {
    pub store: StoreId,
    pub key: Key,
}

/// Immutable ordered sequence of elements, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    elements: Arc<[Element]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<ChainOrigin>,
}

impl Chain {
    pub fn empty() -> Self {
        Self {
            elements: Arc::from(Vec::new()),
            origin: None,
        }
    }

    pub(crate) fn from_parts(elements: Arc<[Element]>, origin: Option<ChainOrigin>) -> Self {
        Self { elements, origin }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Iterate from the head (oldest) to the newest element.
    pub fn iter(&self) -> slice::Iter<'_, Element> {
        self.elements.iter()
    }

    /// Iterate from the newest element back to the head.
    pub fn reverse_iter(&self) -> Rev<slice::Iter<'_, Element>> {
        self.elements.iter().rev()
    }

    pub fn payloads(&self) -> impl DoubleEndedIterator<Item = &[u8]> + '_ {
        self.elements.iter().map(Element::payload)
    }

    /// Store and key this chain was read from, if it is a store snapshot.
    pub fn origin(&self) -> Option<&ChainOrigin> {
        self.origin.as_ref()
    }

    pub(crate) fn elements(&self) -> &[Element] {
        &self.elements
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Element;
    type IntoIter = slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
