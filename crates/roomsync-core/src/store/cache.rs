// ── Query cache ──
//
// Key-addressed storage for server-derived data. Each key owns a `watch`
// slot so subscribers of one resource are woken only by changes to it; a
// cache-wide version counter lets coarse observers notice any change.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::trace;

use super::entry::{CacheEntry, CacheStatus, RawEntry};
use super::key::{KeyMatch, QueryKey};
use crate::stream::EntryStream;

type Slot = watch::Sender<Option<RawEntry>>;

/// Resource cache shared by the fetch and mutation coordinators.
///
/// Entries live as long as the cache does; nothing is evicted during a
/// session. All methods take `&self` and are safe to call from any task.
pub struct QueryCache {
    slots: DashMap<QueryKey, Slot>,
    version: watch::Sender<u64>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            slots: DashMap::new(),
            version,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Typed snapshot of the entry for `key`, if one exists.
    ///
    /// A value stored under a different type reads as absent data.
    pub fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<CacheEntry<T>> {
        let slot = self.slots.get(key)?;
        let raw = slot.borrow();
        (*raw)
            .as_ref()
            .map(|raw| CacheEntry::from_raw(key.clone(), raw))
    }

    /// Like [`get`](Self::get), but a missing entry reads as `Idle`.
    pub fn get_or_idle<T: Send + Sync + 'static>(&self, key: &QueryKey) -> CacheEntry<T> {
        self.get(key)
            .unwrap_or_else(|| CacheEntry::idle(key.clone()))
    }

    pub(crate) fn raw(&self, key: &QueryKey) -> Option<RawEntry> {
        self.slots.get(key)?.borrow().clone()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.borrow().is_some())
    }

    /// All keys that currently hold an entry.
    pub fn keys(&self) -> Vec<QueryKey> {
        self.slots
            .iter()
            .filter(|slot| slot.value().borrow().is_some())
            .map(|slot| slot.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every change to any entry.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Replace the entry stored under `entry.key`.
    pub fn set<T: Send + Sync + 'static>(&self, entry: CacheEntry<T>) {
        let key = entry.key.clone();
        let raw = entry.into_raw();
        self.modify(&key, |slot| {
            *slot = Some(raw);
            (true, ())
        });
    }

    /// Store a freshly obtained value as a successful entry.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let raw = RawEntry::success(Arc::new(value));
        self.modify(key, |slot| {
            *slot = Some(raw);
            (true, ())
        });
    }

    /// Mark every matching entry stale without discarding its value.
    /// A matching entry that is still loading counts as touched even if it
    /// was already stale: the response it is waiting for will be committed
    /// as stale. Returns the number of entries touched.
    pub fn invalidate(&self, matcher: &KeyMatch) -> usize {
        let mut touched = 0;
        for slot in &self.slots {
            if !matcher.matches(slot.key()) {
                continue;
            }
            let changed = slot.value().send_if_modified(|entry| match entry {
                Some(entry) if !entry.stale || entry.status == CacheStatus::Loading => {
                    entry.stale = true;
                    entry.generation += 1;
                    true
                }
                _ => false,
            });
            if changed {
                trace!(key = %slot.key(), "entry invalidated");
                touched += 1;
            }
        }
        if touched > 0 {
            self.bump_version();
        }
        touched
    }

    /// Atomically inspect and rewrite one slot, creating it if needed.
    ///
    /// `f` returns whether it changed the slot plus a result. Subscribers
    /// and the version counter are notified only on change. `f` must not
    /// call back into the cache.
    pub(crate) fn modify<R>(
        &self,
        key: &QueryKey,
        f: impl FnOnce(&mut Option<RawEntry>) -> (bool, R),
    ) -> R {
        let mut output = None;
        let changed = {
            let slot = self
                .slots
                .entry(key.clone())
                .or_insert_with(|| watch::channel(None).0)
                .downgrade();
            slot.send_if_modified(|entry| {
                let (changed, result) = f(entry);
                output = Some(result);
                changed
            })
        };
        if changed {
            trace!(%key, "entry updated");
            self.bump_version();
        }
        output.expect("send_if_modified always runs its closure")
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to changes of a single entry.
    pub fn subscribe<T: Send + Sync + 'static>(&self, key: &QueryKey) -> EntryStream<T> {
        let receiver = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();
        EntryStream::new(key.clone(), receiver)
    }

    /// Subscribe to the cache-wide version counter.
    pub fn subscribe_version(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
