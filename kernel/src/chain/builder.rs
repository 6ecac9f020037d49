// Chain and element factories.
//
// Used to seed appends and to build the replacement chain handed to
// `ServerStore::replace_at_head`.

use std::sync::Arc;

use super::{Chain, Element};

/// Builds unstamped elements from payload bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementBuilder;

impl ElementBuilder {
    pub fn build(&self, payload: impl Into<Arc<[u8]>>) -> Element {
        Element::new(payload.into())
    }
}

/// Builds detached chains (no store origin) from elements or payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainBuilder;

impl ChainBuilder {
    pub fn build(&self, elements: impl IntoIterator<Item = Element>) -> Chain {
        let elements: Vec<Element> = elements.into_iter().collect();
        Chain::from_parts(elements.into(), None)
    }

    pub fn from_payloads<P>(&self, payloads: impl IntoIterator<Item = P>) -> Chain
    where
        P: Into<Arc<[u8]>>,
    {
        self.build(payloads.into_iter().map(|p| ElementBuilder.build(p)))
    }
}
