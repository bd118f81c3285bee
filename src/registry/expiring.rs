//! Deadline-bounded membership set.
//!
//! Entries carry an explicit deadline and are expired lazily at read time, so
//! correctness never depends on a cleanup timer firing. A suspended host that
//! never runs a sweep still answers membership queries correctly; the only
//! cost of skipping sweeps is memory held by dead entries.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

/// Membership set whose entries expire at an insert-time deadline.
///
/// Designed to be wrapped in `Arc` and shared across tasks; all operations
/// take `&self`. Check-and-insert is atomic: the shard lock is held from the
/// membership check through the insert, so two concurrent `try_insert` calls
/// for the same key cannot both succeed.
#[derive(Debug, Default)]
pub struct ExpiringSet<K>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Instant>,
}

impl<K> ExpiringSet<K>
where
    K: Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Inserts `key` with a deadline `ttl` from now, replacing any existing
    /// deadline.
    pub fn insert(&self, key: K, ttl: Duration) {
        self.entries.insert(key, Instant::now() + ttl);
    }

    /// Atomically inserts `key` unless it is already live.
    ///
    /// Returns `true` when the key was absent or expired (the entry is now
    /// live with the new deadline), `false` when a live entry already exists.
    pub fn try_insert(&self, key: K, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() <= now {
                    occupied.insert(now + ttl);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now + ttl);
                true
            }
        }
    }

    /// Re-arms an existing entry's deadline to `ttl` from now.
    ///
    /// No-op when the key is absent or already expired.
    pub fn rearm(&self, key: &K, ttl: Duration) {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key)
            && *entry.value() > now
        {
            *entry.value_mut() = now + ttl;
        }
    }

    /// Returns whether `key` is live, removing it if its deadline has passed.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if *entry.value() > now {
                return true;
            }
        } else {
            return false;
        }
        // Deadline passed: remove, re-checking under the shard lock because a
        // writer may have re-armed the entry since the read above.
        self.entries.remove_if(key, |_, deadline| *deadline <= now);
        false
    }

    /// Removes `key` unconditionally.
    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drops every expired entry. Purely a memory bound; never required for
    /// correctness.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, deadline| *deadline > now);
    }

    /// Number of entries currently stored, including not-yet-swept dead ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
