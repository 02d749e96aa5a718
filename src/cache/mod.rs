//! Continuation cache.
//!
//! [`ContinuationStore`] is the single piece of shared mutable state in the
//! subsystem: a bounded, TTL-aware map from [`CacheKey`](crate::CacheKey)
//! to either an in-flight generation (*pending*) or a servable
//! continuation (*ready*). See the [`store`] module docs for the admission
//! and eviction rules.

pub mod store;

pub use store::{Admission, CacheConfig, ContinuationStore, PendingSlot, ReadyEntry, StoreStats};
