// ── Reactive entry streams ──
//
// Subscription types for consuming changes to a single cache entry.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::{CacheEntry, QueryKey, RawEntry};

/// A subscription to one cache entry.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed()`](Self::changed) or by converting to a
/// `Stream`. A key with no entry yet reads as an `Idle` entry.
pub struct EntryStream<T: Send + Sync + 'static> {
    key: QueryKey,
    current: CacheEntry<T>,
    receiver: watch::Receiver<Option<RawEntry>>,
}

impl<T: Send + Sync + 'static> EntryStream<T> {
    pub(crate) fn new(key: QueryKey, receiver: watch::Receiver<Option<RawEntry>>) -> Self {
        let current = snapshot(&key, (*receiver.borrow()).as_ref());
        Self {
            key,
            current,
            receiver,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Get the snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &CacheEntry<T> {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> CacheEntry<T> {
        snapshot(&self.key, (*self.receiver.borrow()).as_ref())
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the cache has been dropped.
    pub async fn changed(&mut self) -> Option<CacheEntry<T>> {
        self.receiver.changed().await.ok()?;
        let snap = snapshot(&self.key, (*self.receiver.borrow_and_update()).as_ref());
        self.current = snap.clone();
        Some(snap)
    }

    /// Wait until no request for this entry is running, returning the
    /// settled snapshot. Returns immediately if already settled.
    pub async fn settled(&mut self) -> Option<CacheEntry<T>> {
        let latest = snapshot(&self.key, (*self.receiver.borrow_and_update()).as_ref());
        self.current = latest;
        while !self.current.is_settled() {
            self.changed().await?;
        }
        Some(self.current.clone())
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EntryWatchStream<T> {
        EntryWatchStream {
            key: self.key,
            inner: WatchStream::new(self.receiver),
            _marker: PhantomData,
        }
    }
}

fn snapshot<T: Send + Sync + 'static>(key: &QueryKey, raw: Option<&RawEntry>) -> CacheEntry<T> {
    raw.map_or_else(
        || CacheEntry::idle(key.clone()),
        |raw| CacheEntry::from_raw(key.clone(), raw),
    )
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current snapshot first, then a new one each time the entry
/// changes.
pub struct EntryWatchStream<T: Send + Sync + 'static> {
    key: QueryKey,
    inner: WatchStream<Option<RawEntry>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Stream for EntryWatchStream<T> {
    type Item = CacheEntry<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream<Option<RawEntry>> is Unpin, so re-pinning is sound.
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|item| item.map(|raw| snapshot(&self.key, raw.as_ref())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use crate::query_key;
    use crate::store::{CacheStatus, QueryCache};

    #[tokio::test]
    async fn stream_yields_current_then_updates() {
        let cache = QueryCache::new();
        let key = query_key!["categories"];
        let mut stream = cache.subscribe::<u8>(&key).into_stream();

        let first = stream.next().await.unwrap();
        assert_eq!(first.status, CacheStatus::Idle);

        cache.set_data(&key, 3_u8);
        let second = stream.next().await.unwrap();
        assert_eq!(second.data(), Some(&3));
    }

    #[tokio::test]
    async fn latest_tracks_changes_without_waiting() {
        let cache = QueryCache::new();
        let key = query_key!["amenities"];
        let stream = cache.subscribe::<u8>(&key);
        cache.set_data(&key, 9_u8);

        assert_eq!(stream.current().status, CacheStatus::Idle);
        assert_eq!(stream.latest().data(), Some(&9));
    }
}
