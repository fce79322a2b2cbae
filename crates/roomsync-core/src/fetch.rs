// ── Fetch coordination ──
//
// Decides whether a key needs a request, runs at most one request per key,
// and commits results only if they are still wanted. Every request gets a
// ticket; abandoning a key (disabling it, or moving its scope elsewhere)
// forgets the ticket, and a result whose ticket is gone is dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace, warn};

use crate::error::CoreError;
use crate::store::{CacheEntry, CacheStatus, KeyMatch, QueryCache, QueryKey, RawEntry};

/// Base delay between retries of a transient failure; attempt `n` waits
/// `n` times this.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

// ── QueryOptions ─────────────────────────────────────────────────

/// Per-call behaviour of [`FetchCoordinator::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// When `false` no request is made and any running one is abandoned.
    pub enabled: bool,
    /// Logical resource this key currently represents. Moving a scope to a
    /// new key abandons the request for the key it held before.
    pub scope: Option<String>,
    /// Successful entries older than this are refetched. `None` means
    /// fresh until invalidated.
    pub stale_time: Option<Duration>,
    /// Extra attempts for transient (network) failures.
    pub retry: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: None,
            stale_time: None,
            retry: 0,
        }
    }
}

impl QueryOptions {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn stale_time(mut self, stale_time: Option<Duration>) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }
}

// ── FetchCoordinator ─────────────────────────────────────────────

/// Runs fetches against a [`QueryCache`].
///
/// Cheaply cloneable; clones share the cache and the in-flight table.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<FetchInner>,
}

struct FetchInner {
    cache: Arc<QueryCache>,
    /// Key -> ticket of the one request whose result may be committed.
    in_flight: DashMap<QueryKey, u64>,
    /// Scope name -> key it currently points at.
    scopes: DashMap<String, QueryKey>,
    next_ticket: AtomicU64,
}

impl FetchCoordinator {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self {
            inner: Arc::new(FetchInner {
                cache,
                in_flight: DashMap::new(),
                scopes: DashMap::new(),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.inner.cache
    }

    /// Number of requests whose results are still wanted.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.in_flight.contains_key(key)
    }

    /// Make sure `key` is loaded or loading, returning its current entry.
    ///
    /// Starts `fetch` on the Tokio runtime when the entry is absent, idle,
    /// stale, or older than `options.stale_time`; a key that already has a
    /// request running is returned as-is. Settled errors are not retried
    /// until the key is invalidated. With `enabled = false` nothing is
    /// fetched and a running request for the key is abandoned.
    pub fn ensure<T, F, Fut>(&self, key: QueryKey, options: &QueryOptions, fetch: F) -> CacheEntry<T>
    where
        T: Send + Sync + 'static,
        F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        let cache = &self.inner.cache;

        if let Some(scope) = &options.scope {
            self.move_scope(scope, &key);
        }

        if !options.enabled {
            self.abandon(&key);
            cache.modify(&key, |slot| {
                if slot.is_none() {
                    *slot = Some(RawEntry::default());
                    (true, ())
                } else {
                    (false, ())
                }
            });
            return cache.get_or_idle(&key);
        }

        let (ticket, generation) = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => {
                trace!(%key, "request already in flight");
                return cache.get_or_idle(&key);
            }
            Entry::Vacant(vacant) => {
                let stale_time = options.stale_time;
                let start = cache.modify(&key, |slot| {
                    let needed = match slot {
                        None => true,
                        Some(entry) => match entry.status {
                            CacheStatus::Idle | CacheStatus::Loading => true,
                            CacheStatus::Success => entry.stale || entry.is_expired(stale_time),
                            CacheStatus::Error => entry.stale,
                        },
                    };
                    if needed {
                        let entry = slot.get_or_insert_with(RawEntry::default);
                        entry.status = CacheStatus::Loading;
                        (true, Some(entry.generation))
                    } else {
                        (false, None)
                    }
                });
                let Some(generation) = start else {
                    return cache.get_or_idle(&key);
                };
                let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                vacant.insert(ticket);
                (ticket, generation)
            }
        };

        debug!(%key, ticket, "fetch started");
        let this = self.clone();
        let task_key = key.clone();
        let retry = options.retry;
        tokio::spawn(async move {
            let mut attempt = 0;
            let result = loop {
                match fetch(task_key.clone()).await {
                    Err(err) if err.is_transient() && attempt < retry => {
                        if !this.is_current(&task_key, ticket) {
                            break Err(err);
                        }
                        attempt += 1;
                        warn!(key = %task_key, attempt, error = %err, "transient failure, retrying");
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                    other => break other,
                }
            };
            this.commit(&task_key, ticket, generation, result);
        });

        cache.get_or_idle(&key)
    }

    /// [`ensure`](Self::ensure), then wait until the key settles.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        options: &QueryOptions,
        fetch: F,
    ) -> CacheEntry<T>
    where
        T: Send + Sync + 'static,
        F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        let fetch = Arc::new(fetch);
        loop {
            let mut stream = self.inner.cache.subscribe::<T>(&key);
            let call = Arc::clone(&fetch);
            let entry = self.ensure(key.clone(), options, move |key| (*call)(key));
            let settled = if entry.is_settled() {
                entry
            } else {
                stream.settled().await.unwrap_or(entry)
            };
            // Invalidated while the request ran: its answer is already outdated.
            let outdated = settled.stale
                && options.enabled
                && matches!(settled.status, CacheStatus::Success | CacheStatus::Error);
            if !outdated {
                return settled;
            }
            debug!(%key, "invalidated during fetch, fetching again");
        }
    }

    /// Wait for whatever request is running for `key` to finish.
    pub async fn settled<T: Send + Sync + 'static>(&self, key: &QueryKey) -> CacheEntry<T> {
        let mut stream = self.inner.cache.subscribe::<T>(key);
        match stream.settled().await {
            Some(entry) => entry,
            None => self.inner.cache.get_or_idle(key),
        }
    }

    /// Invalidate exactly `key` and fetch it again.
    pub fn refetch<T, F, Fut>(&self, key: QueryKey, options: &QueryOptions, fetch: F) -> CacheEntry<T>
    where
        T: Send + Sync + 'static,
        F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        self.inner.cache.invalidate(&KeyMatch::Exact(key.clone()));
        self.ensure(key, options, fetch)
    }

    /// Detach a scope from its key, abandoning that key's request.
    pub fn release_scope(&self, scope: &str) {
        if let Some((_, key)) = self.inner.scopes.remove(scope) {
            debug!(scope, %key, "scope released");
            self.abandon(&key);
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn move_scope(&self, scope: &str, key: &QueryKey) {
        let previous = self.inner.scopes.insert(scope.to_owned(), key.clone());
        if let Some(previous) = previous.filter(|prev| prev != key) {
            debug!(scope, from = %previous, to = %key, "scope moved");
            self.abandon(&previous);
        }
    }

    /// Forget the running request for `key`. A `Loading` entry falls back
    /// to `Idle` with its value kept and is marked stale so the next
    /// `ensure` starts over.
    fn abandon(&self, key: &QueryKey) {
        if self.inner.in_flight.remove(key).is_none() {
            return;
        }
        debug!(%key, "request abandoned");
        self.inner.cache.modify(key, |slot| match slot {
            Some(entry) if entry.status == CacheStatus::Loading => {
                entry.status = CacheStatus::Idle;
                entry.stale = true;
                (true, ())
            }
            _ => (false, ()),
        });
    }

    fn is_current(&self, key: &QueryKey, ticket: u64) -> bool {
        self.inner
            .in_flight
            .get(key)
            .is_some_and(|current| *current == ticket)
    }

    /// Store a result if its ticket is still current. An entry whose
    /// generation moved past `generation` was invalidated mid-flight and is
    /// committed stale, so the next access fetches again.
    fn commit<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        ticket: u64,
        generation: u64,
        result: Result<T, CoreError>,
    ) {
        let Entry::Occupied(current) = self.inner.in_flight.entry(key.clone()) else {
            debug!(%key, ticket, "discarding response for abandoned request");
            return;
        };
        if *current.get() != ticket {
            debug!(%key, ticket, "discarding superseded response");
            return;
        }

        match result {
            Ok(value) => {
                trace!(%key, ticket, "fetch succeeded");
                self.inner.cache.modify(key, |slot| {
                    let current = slot.as_ref().map_or(generation, |entry| entry.generation);
                    let mut raw = RawEntry::success(Arc::new(value));
                    raw.stale = current != generation;
                    raw.generation = current;
                    *slot = Some(raw);
                    (true, ())
                });
            }
            Err(error) => {
                warn!(%key, ticket, %error, "fetch failed");
                self.inner.cache.modify(key, |slot| {
                    let entry = slot.get_or_insert_with(RawEntry::default);
                    entry.status = CacheStatus::Error;
                    entry.error = Some(error);
                    entry.stale = entry.generation != generation;
                    (true, ())
                });
            }
        }
        current.remove();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;
    use crate::query_key;

    fn coordinator() -> FetchCoordinator {
        FetchCoordinator::new(Arc::new(QueryCache::new()))
    }

    /// A fetch function that counts calls and returns `value`.
    fn counting(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Fn(QueryKey) -> futures_util::future::Ready<Result<u32, CoreError>> + Send + Sync + 'static
    {
        let calls = Arc::clone(calls);
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(value))
        }
    }

    /// A fetch function that waits for `gate` before returning `value`.
    fn gated(
        gate: &Arc<Notify>,
        calls: &Arc<AtomicUsize>,
        value: Result<u32, CoreError>,
    ) -> impl Fn(QueryKey) -> std::pin::Pin<Box<dyn Future<Output = Result<u32, CoreError>> + Send>>
    + Send
    + Sync
    + 'static {
        let gate = Arc::clone(gate);
        let calls = Arc::clone(calls);
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&gate);
            let value = value.clone();
            Box::pin(async move {
                gate.notified().await;
                value
            })
        }
    }

    #[tokio::test]
    async fn disabled_query_makes_no_request() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["check", 42_u64];

        let entry = fetcher.ensure(key.clone(), &QueryOptions::default().enabled(false), counting(&calls, 1));
        assert_eq!(entry.status, CacheStatus::Idle);
        assert!(fetcher.cache().contains(&key));

        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_commits_success() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let entry = fetcher
            .fetch(query_key!["rooms"], &QueryOptions::default(), counting(&calls, 7))
            .await;

        assert_eq!(entry.status, CacheStatus::Success);
        assert_eq!(entry.data(), Some(&7));
        assert!(entry.fetched_at.is_some());
        assert!(entry.error.is_none());
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn at_most_one_request_in_flight_per_key() {
        let fetcher = coordinator();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["rooms", 42_u64];
        let opts = QueryOptions::default();

        let first = fetcher.ensure(key.clone(), &opts, gated(&gate, &calls, Ok(1)));
        let second = fetcher.ensure(key.clone(), &opts, gated(&gate, &calls, Ok(2)));
        assert_eq!(first.status, CacheStatus::Loading);
        assert_eq!(second.status, CacheStatus::Loading);

        gate.notify_one();
        let settled = fetcher.settled::<u32>(&key).await;
        assert_eq!(settled.data(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_success_is_reused() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["amenities"];
        let opts = QueryOptions::default();

        fetcher.fetch(key.clone(), &opts, counting(&calls, 1)).await;
        let again = fetcher.ensure(key, &opts, counting(&calls, 2));

        assert_eq!(again.status, CacheStatus::Success);
        assert_eq!(again.data(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entry_is_revalidated_with_old_value_visible() {
        let fetcher = coordinator();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["rooms"];
        let opts = QueryOptions::default();

        fetcher.fetch(key.clone(), &opts, counting(&calls, 1)).await;
        fetcher.cache().invalidate(&KeyMatch::Exact(key.clone()));

        let loading = fetcher.ensure(key.clone(), &opts, gated(&gate, &calls, Ok(2)));
        assert_eq!(loading.status, CacheStatus::Loading);
        assert_eq!(loading.data(), Some(&1));

        gate.notify_one();
        let settled = fetcher.settled::<u32>(&key).await;
        assert_eq!(settled.status, CacheStatus::Success);
        assert_eq!(settled.data(), Some(&2));
        assert!(!settled.stale);
    }

    #[tokio::test]
    async fn zero_stale_time_always_refetches() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["categories"];
        let opts = QueryOptions::default().stale_time(Some(Duration::ZERO));

        fetcher.fetch(key.clone(), &opts, counting(&calls, 1)).await;
        fetcher.fetch(key, &opts, counting(&calls, 2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_keeps_previous_value() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["rooms", 42_u64];
        let opts = QueryOptions::default();

        fetcher.fetch(key.clone(), &opts, counting(&calls, 5)).await;
        let entry = fetcher
            .refetch(key.clone(), &opts, |_| async {
                Err::<u32, _>(CoreError::Server {
                    message: "boom".into(),
                    status: Some(500),
                })
            });
        assert_eq!(entry.status, CacheStatus::Loading);

        let settled = fetcher.settled::<u32>(&key).await;
        assert_eq!(settled.status, CacheStatus::Error);
        assert_eq!(settled.data(), Some(&5));
        assert!(matches!(settled.error, Some(CoreError::Server { .. })));
    }

    #[tokio::test]
    async fn settled_error_is_not_refetched_until_invalidated() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["me"];
        let opts = QueryOptions::default();
        let failing = {
            let calls = Arc::clone(&calls);
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<u32, _>(CoreError::Auth {
                        status: 401,
                        message: "anonymous".into(),
                    })
                }
            }
        };

        fetcher.fetch(key.clone(), &opts, failing.clone()).await;
        let again = fetcher.ensure(key.clone(), &opts, failing.clone());
        assert_eq!(again.status, CacheStatus::Error);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        fetcher.cache().invalidate(&KeyMatch::Exact(key.clone()));
        fetcher.fetch(key, &opts, failing).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let flaky = {
            let calls = Arc::clone(&calls);
            move |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CoreError::Network {
                            message: "connection reset".into(),
                        })
                    } else {
                        Ok(99_u32)
                    }
                }
            }
        };

        let entry = fetcher
            .fetch(query_key!["rooms"], &QueryOptions::default().retry(3), flaky)
            .await;
        assert_eq!(entry.data(), Some(&99));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let denied = {
            let calls = Arc::clone(&calls);
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<u32, _>(CoreError::Auth {
                        status: 401,
                        message: "anonymous".into(),
                    })
                }
            }
        };

        let entry = fetcher
            .fetch(query_key!["me"], &QueryOptions::default().retry(3), denied)
            .await;
        assert!(entry.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_key_wins_within_a_scope() {
        let fetcher = coordinator();
        let slow_gate = Arc::new(Notify::new());
        let fast_gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let first_key = query_key!["check", 42_u64, 1_u64];
        let second_key = query_key!["check", 42_u64, 2_u64];
        let opts = QueryOptions::default().scope("availability:42");

        fetcher.ensure(first_key.clone(), &opts, gated(&slow_gate, &calls, Ok(1)));
        fetcher.ensure(second_key.clone(), &opts, gated(&fast_gate, &calls, Ok(2)));

        // The abandoned key drops back to idle right away.
        let first = fetcher.cache().get::<u32>(&first_key).unwrap();
        assert_eq!(first.status, CacheStatus::Idle);

        fast_gate.notify_one();
        let second = fetcher.settled::<u32>(&second_key).await;
        assert_eq!(second.data(), Some(&2));

        // The late response for the first key arrives and is discarded.
        slow_gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let first = fetcher.cache().get::<u32>(&first_key).unwrap();
        assert_eq!(first.status, CacheStatus::Idle);
        assert!(first.value.is_none());
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn disabling_abandons_running_request() {
        let fetcher = coordinator();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["check", 42_u64];

        fetcher.ensure(key.clone(), &QueryOptions::default(), gated(&gate, &calls, Ok(1)));
        let disabled = fetcher.ensure(
            key.clone(),
            &QueryOptions::default().enabled(false),
            gated(&gate, &calls, Ok(2)),
        );
        assert_eq!(disabled.status, CacheStatus::Idle);

        gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(fetcher.cache().get::<u32>(&key).unwrap().value.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    async fn wait_for_calls(calls: &AtomicUsize, n: usize) {
        while calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn invalidation_during_flight_marks_result_stale() {
        let fetcher = coordinator();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["me"];
        let opts = QueryOptions::default();
        let anonymous = Err(CoreError::Auth {
            status: 401,
            message: "anonymous".into(),
        });

        fetcher.ensure(key.clone(), &opts, gated(&gate, &calls, anonymous));
        wait_for_calls(&calls, 1).await;
        assert_eq!(fetcher.cache().invalidate(&KeyMatch::Exact(key.clone())), 1);

        gate.notify_one();
        let settled = fetcher.settled::<u32>(&key).await;
        assert_eq!(settled.status, CacheStatus::Error);
        assert!(settled.stale);

        // The next read goes back to the backend.
        let later = Arc::new(AtomicUsize::new(0));
        let refreshed = fetcher.fetch(key, &opts, counting(&later, 3)).await;
        assert_eq!(later.load(Ordering::SeqCst), 1);
        assert_eq!(refreshed.status, CacheStatus::Success);
        assert_eq!(refreshed.data(), Some(&3));
        assert!(!refreshed.stale);
    }

    #[tokio::test]
    async fn success_before_invalidation_is_not_stale() {
        let fetcher = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["rooms"];
        let opts = QueryOptions::default();

        fetcher.fetch(key.clone(), &opts, counting(&calls, 1)).await;
        fetcher.cache().invalidate(&KeyMatch::Exact(key.clone()));
        let refreshed = fetcher.fetch(key, &opts, counting(&calls, 2)).await;

        assert_eq!(refreshed.data(), Some(&2));
        assert!(!refreshed.stale);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn awaited_fetch_retries_after_mid_flight_invalidation() {
        let fetcher = coordinator();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!["me"];

        let task = {
            let fetcher = fetcher.clone();
            let key = key.clone();
            let fetch = gated(&gate, &calls, Ok(7));
            tokio::spawn(async move { fetcher.fetch(key, &QueryOptions::default(), fetch).await })
        };

        wait_for_calls(&calls, 1).await;
        fetcher.cache().invalidate(&KeyMatch::Exact(key.clone()));
        gate.notify_one();

        wait_for_calls(&calls, 2).await;
        gate.notify_one();

        let entry = task.await.unwrap();
        assert_eq!(entry.status, CacheStatus::Success);
        assert_eq!(entry.data(), Some(&7));
        assert!(!entry.stale);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
