// Chainstore Kernel
//
// Server-side storage primitive for clustered caches: per-key append-only
// chains with optimistic compaction.

pub mod chain;
pub mod config;
pub mod replay;
pub mod store;
