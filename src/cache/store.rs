//! Bounded store of pending and ready continuations.
//!
//! # Lifecycle
//!
//! ```text
//!   begin_pending ──► Pending ──complete──► Ready ──TTL / LRU / clear──► gone
//!                        │
//!                        └──abandon──► gone (slot free for a retry)
//! ```
//!
//! At most one entry (pending or ready) exists per key. A pending entry is
//! never evicted: the store does not abandon work it handed out. When an
//! admission would exceed `max_entries`, expired ready entries are dropped
//! first, then the least-recently-used ready entry. If every slot is
//! pending the admission is refused and the caller generates without a
//! cache slot.
//!
//! # Locking
//!
//! All state lives behind one `std::sync::Mutex`. No operation awaits or
//! performs I/O while holding it, so the lock is never held across a
//! suspension point and a plain mutex is cheaper than an async one.
//!
//! Timestamps come from [`tokio::time::Instant`] so tests can drive expiry
//! with a paused clock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::fingerprint::CacheKey;
use crate::telemetry;
use crate::types::Continuation;

/// Configuration for the continuation store.
///
/// ```rust
/// # use huginn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(200)
///     .ttl(Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Hard cap on pending + ready entries. Default: 50.
    pub max_entries: usize,
    /// Age after which a ready entry is treated as absent. Default: 10 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            ttl: Duration::from_secs(600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries (pending + ready).
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for ready entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Outcome of asking the store for a pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A pending entry was inserted; the caller must complete or abandon it.
    Admitted,
    /// A fresh ready entry already exists for the key.
    AlreadyReady,
    /// Another caller is already generating this key.
    InFlight,
    /// The store is at capacity and holds no evictable ready entry.
    Full,
}

impl Admission {
    /// Whether the caller won the slot.
    pub fn is_admitted(self) -> bool {
        self == Admission::Admitted
    }

    pub(crate) fn reason_label(self) -> &'static str {
        match self {
            Admission::Admitted => "admitted",
            Admission::AlreadyReady => "ready",
            Admission::InFlight => "in_flight",
            Admission::Full => "full",
        }
    }
}

/// A completed continuation and when it was stored.
#[derive(Debug, Clone)]
pub struct ReadyEntry {
    pub continuation: Continuation,
    pub created_at: Instant,
}

impl ReadyEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

#[derive(Debug)]
enum Slot {
    Pending,
    Ready(ReadyEntry),
}

/// Point-in-time entry counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub pending: usize,
    /// Ready entries, including expired ones not yet removed.
    pub ready: usize,
    pub capacity: usize,
}

/// Concurrency-safe store with at-most-one-generation-per-key semantics.
pub struct ContinuationStore {
    slots: Mutex<LruCache<CacheKey, Slot>>,
    config: CacheConfig,
}

impl ContinuationStore {
    /// Create an empty store.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            // Capacity is enforced by hand: the crate's own eviction would
            // happily drop pending entries.
            slots: Mutex::new(LruCache::unbounded()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Slot>> {
        // No operation can leave the map half-updated, so a poisoned lock
        // still guards consistent data.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically insert a pending entry if no pending or fresh ready entry
    /// exists for `key`.
    ///
    /// Returns `true` if this caller is now responsible for producing the
    /// continuation. Of any number of concurrent calls for the same key, at
    /// most one returns `true`.
    pub fn try_begin_pending(&self, key: &CacheKey) -> bool {
        self.begin_pending(key).is_admitted()
    }

    /// Like [`try_begin_pending`](Self::try_begin_pending), reporting why a
    /// slot was refused.
    pub fn begin_pending(&self, key: &CacheKey) -> Admission {
        let ttl = self.config.ttl;
        let mut slots = self.lock();

        let stale = match slots.peek(key) {
            Some(Slot::Pending) => return Admission::InFlight,
            Some(Slot::Ready(entry)) if !entry.is_expired(ttl) => return Admission::AlreadyReady,
            Some(Slot::Ready(_)) => true,
            None => false,
        };
        if stale {
            slots.pop(key);
        }

        if slots.len() >= self.config.max_entries {
            drop_expired(&mut slots, ttl);
        }
        while slots.len() >= self.config.max_entries {
            let Some(victim) = least_recent_ready(&slots) else {
                debug!(key = %key.short(), len = slots.len(), "store full of pending work");
                return Admission::Full;
            };
            slots.pop(&victim);
            metrics::counter!(telemetry::EVICTIONS_TOTAL).increment(1);
            debug!(evicted = %victim.short(), "evicted least-recently-used continuation");
        }

        slots.put(*key, Slot::Pending);
        Admission::Admitted
    }

    /// Reserve a pending slot guarded by [`PendingSlot`].
    ///
    /// Returns `None` when [`begin_pending`](Self::begin_pending) would not
    /// admit. Dropping the guard without completing it abandons the slot.
    pub fn reserve(self: &Arc<Self>, key: CacheKey) -> Option<PendingSlot> {
        self.begin_pending(&key)
            .is_admitted()
            .then(|| PendingSlot::new(Arc::clone(self), key))
    }

    /// Turn a pending entry into a ready one stamped with the current time.
    ///
    /// Returns `false` and logs if `key` is not pending (it was never
    /// admitted, already completed, or abandoned); the continuation is
    /// discarded in that case.
    pub fn complete(&self, key: &CacheKey, continuation: Continuation) -> bool {
        let mut slots = self.lock();
        match slots.get_mut(key) {
            Some(slot @ Slot::Pending) => {
                *slot = Slot::Ready(ReadyEntry {
                    continuation,
                    created_at: Instant::now(),
                });
                true
            }
            Some(Slot::Ready(_)) => {
                warn!(key = %key.short(), "complete called on a ready entry, ignoring");
                false
            }
            None => {
                warn!(key = %key.short(), "complete called without a pending entry, ignoring");
                false
            }
        }
    }

    /// Remove a pending entry after a failed generation.
    ///
    /// Ready entries are left alone. Returns whether a pending entry was
    /// removed.
    pub fn abandon(&self, key: &CacheKey) -> bool {
        let mut slots = self.lock();
        if matches!(slots.peek(key), Some(Slot::Pending)) {
            slots.pop(key);
            true
        } else {
            false
        }
    }

    /// Fetch a fresh ready continuation and mark it most recently used.
    ///
    /// Pending and absent keys return `None`. An expired entry is removed
    /// as a side effect and also returns `None`.
    pub fn get(&self, key: &CacheKey) -> Option<Continuation> {
        let ttl = self.config.ttl;
        let mut slots = self.lock();

        let expired = match slots.peek(key) {
            Some(Slot::Ready(entry)) => entry.is_expired(ttl),
            _ => return None,
        };
        if expired {
            slots.pop(key);
            debug!(key = %key.short(), "dropped expired continuation");
            return None;
        }

        match slots.get(key) {
            Some(Slot::Ready(entry)) => Some(entry.continuation.clone()),
            _ => None,
        }
    }

    /// Whether a fresh ready entry exists, without touching recency.
    pub fn contains_ready(&self, key: &CacheKey) -> bool {
        let ttl = self.config.ttl;
        matches!(self.lock().peek(key), Some(Slot::Ready(e)) if !e.is_expired(ttl))
    }

    /// Whether a generation is in flight for `key`.
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        matches!(self.lock().peek(key), Some(Slot::Pending))
    }

    /// Total entries, pending and ready.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries with a generation in flight.
    pub fn pending_count(&self) -> usize {
        self.stats().pending
    }

    /// Ready entries, including expired ones not yet removed.
    pub fn ready_count(&self) -> usize {
        self.stats().ready
    }

    pub fn stats(&self) -> StoreStats {
        let slots = self.lock();
        let pending = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Pending))
            .count();
        StoreStats {
            pending,
            ready: slots.len() - pending,
            capacity: self.config.max_entries,
        }
    }

    /// Drop every ready entry. Pending entries are kept so in-flight
    /// generations still have somewhere to land.
    ///
    /// Returns the number of entries removed.
    pub fn clear_ready(&self) -> usize {
        let mut slots = self.lock();
        let ready: Vec<CacheKey> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(key, _)| *key)
            .collect();
        for key in &ready {
            slots.pop(key);
        }
        ready.len()
    }

    /// Remove every expired ready entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.ttl;
        drop_expired(&mut self.lock(), ttl)
    }
}

fn drop_expired(slots: &mut LruCache<CacheKey, Slot>, ttl: Duration) -> usize {
    let expired: Vec<CacheKey> = slots
        .iter()
        .filter(|(_, slot)| matches!(slot, Slot::Ready(e) if e.is_expired(ttl)))
        .map(|(key, _)| *key)
        .collect();
    for key in &expired {
        slots.pop(key);
    }
    expired.len()
}

/// `LruCache::iter` runs most- to least-recent; walk it backwards.
fn least_recent_ready(slots: &LruCache<CacheKey, Slot>) -> Option<CacheKey> {
    slots
        .iter()
        .rev()
        .find(|(_, slot)| matches!(slot, Slot::Ready(_)))
        .map(|(key, _)| *key)
}

/// Ownership of one pending entry.
///
/// Obtained from [`ContinuationStore::reserve`]. Call
/// [`complete`](Self::complete) with the generated continuation; any other
/// exit (error, timeout, task abort, panic) drops the guard and abandons
/// the entry so the key can be retried.
#[must_use = "dropping a PendingSlot abandons the reservation"]
pub struct PendingSlot {
    store: Arc<ContinuationStore>,
    key: CacheKey,
    settled: bool,
}

impl PendingSlot {
    pub(crate) fn new(store: Arc<ContinuationStore>, key: CacheKey) -> Self {
        Self {
            store,
            key,
            settled: false,
        }
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// Store the continuation as ready.
    pub fn complete(mut self, continuation: Continuation) -> bool {
        self.settled = true;
        self.store.complete(&self.key, continuation)
    }

    /// Give the slot back explicitly.
    pub fn abandon(self) {}
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if !self.settled {
            self.store.abandon(&self.key);
        }
    }
}
