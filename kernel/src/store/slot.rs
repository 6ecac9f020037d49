// Per-key slot state.
//
// Pure transitions shared by every backend. A transition never touches the
// current state; it returns the next one, which the backend installs under
// its own concurrency discipline. Sequence stamps are handed in by the
// backend from its store-wide `Sequencer`.

use std::sync::Arc;

use super::Sequence;
use crate::chain::{Chain, ChainOrigin, Element};

#[derive(Debug, Clone)]
pub(crate) struct SlotState {
    elements: Arc<[Element]>,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            elements: Arc::from(Vec::new()),
        }
    }
}

impl SlotState {
    pub(crate) fn snapshot(&self, origin: ChainOrigin) -> Chain {
        Chain::from_parts(Arc::clone(&self.elements), Some(origin))
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn appended(&self, payload: &[u8], seq: Sequence) -> SlotState {
        let mut elements = Vec::with_capacity(self.elements.len() + 1);
        elements.extend(self.elements.iter().cloned());
        elements.push(Element::new(Arc::from(payload)).stamped(seq));

        SlotState {
            elements: elements.into(),
        }
    }

    /// Next state after compacting `expected` into `replacement`, together
    /// with the number of elements kept behind the replacement. Replacement
    /// elements are stamped `first_seq`, `first_seq + 1`, ...
    ///
    /// Returns `None` when `expected` is empty or is no longer the current
    /// head, compared element by element on sequence number.
    pub(crate) fn replaced_at_head(
        &self,
        expected: &[Element],
        replacement: &[Element],
        first_seq: Sequence,
    ) -> Option<(SlotState, usize)> {
        if expected.is_empty() || expected.len() > self.elements.len() {
            return None;
        }

        let head_matches = expected
            .iter()
            .zip(self.elements.iter())
            .all(|(seen, current)| seen.seq().is_some() && seen.seq() == current.seq());
        if !head_matches {
            return None;
        }

        let tail = &self.elements[expected.len()..];
        let mut elements = Vec::with_capacity(replacement.len() + tail.len());
        elements.extend(
            replacement
                .iter()
                .zip(first_seq..)
                .map(|(element, seq)| element.stamped(seq)),
        );
        elements.extend(tail.iter().cloned());

        Some((
            SlotState {
                elements: elements.into(),
            },
            tail.len(),
        ))
    }
}
