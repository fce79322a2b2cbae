// ── Session derivation ──
//
// Whether the visitor is signed in is never stored on its own; it is read
// off the cached `["me"]` entry every time, so invalidating that entry
// after login or logout is all it takes to update the session.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::info;

use roomsync_api::models::User;

use crate::error::CoreError;
use crate::fetch::{FetchCoordinator, QueryOptions};
use crate::query_key;
use crate::store::{CacheEntry, CacheStatus, QueryKey};
use crate::stream::EntryStream;

type MeFetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Option<User>, CoreError>> + Send + Sync>;

/// Derived view of the current visitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub user_loading: bool,
    pub is_logged_in: bool,
    pub user: Option<User>,
}

impl Session {
    /// `is_logged_in` holds only when the last `["me"]` fetch did not fail
    /// and produced a user; a 401 therefore reads as signed out even if a
    /// previous user is still cached.
    pub fn from_entry(entry: &CacheEntry<Option<User>>) -> Self {
        let user = entry.data().and_then(Clone::clone);
        Self {
            user_loading: entry.status == CacheStatus::Loading,
            is_logged_in: entry.status != CacheStatus::Error && user.is_some(),
            user,
        }
    }
}

/// Derives [`Session`] snapshots from the `["me"]` cache entry.
#[derive(Clone)]
pub struct SessionManager {
    fetcher: FetchCoordinator,
    fetch_me: MeFetcher,
}

impl SessionManager {
    pub fn new<F, Fut>(fetcher: FetchCoordinator, fetch_me: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<User>, CoreError>> + Send + 'static,
    {
        Self {
            fetcher,
            fetch_me: Arc::new(move || fetch_me().boxed()),
        }
    }

    pub fn key() -> QueryKey {
        query_key!["me"]
    }

    /// A 401 means "signed out", so the lookup is never retried.
    fn options() -> QueryOptions {
        QueryOptions::default().retry(0)
    }

    fn fetch_fn(
        &self,
    ) -> impl Fn(QueryKey) -> BoxFuture<'static, Result<Option<User>, CoreError>> + Send + Sync + 'static
    {
        let fetch_me = Arc::clone(&self.fetch_me);
        move |_| fetch_me()
    }

    /// Current session, starting a `["me"]` fetch if the entry needs one.
    pub fn session(&self) -> Session {
        let entry = self
            .fetcher
            .ensure(Self::key(), &Self::options(), self.fetch_fn());
        Session::from_entry(&entry)
    }

    /// Like [`session`](Self::session), but waits for the fetch to settle.
    pub async fn resolve(&self) -> Session {
        let entry = self
            .fetcher
            .fetch(Self::key(), &Self::options(), self.fetch_fn())
            .await;
        let session = Session::from_entry(&entry);
        info!(
            logged_in = session.is_logged_in,
            user = session.user.as_ref().map(|u| u.username.as_str()),
            "session resolved"
        );
        session
    }

    /// Session as currently cached, without triggering a fetch.
    pub fn peek(&self) -> Session {
        Session::from_entry(&self.fetcher.cache().get_or_idle(&Self::key()))
    }

    /// Subscribe to session changes.
    pub fn watch(&self) -> SessionStream {
        SessionStream {
            inner: self.fetcher.cache().subscribe(&Self::key()),
        }
    }
}

/// Recomputes the [`Session`] on every change to the `["me"]` entry.
pub struct SessionStream {
    inner: EntryStream<Option<User>>,
}

impl SessionStream {
    pub fn current(&self) -> Session {
        Session::from_entry(self.inner.current())
    }

    pub fn latest(&self) -> Session {
        Session::from_entry(&self.inner.latest())
    }

    /// Wait for the next change. Returns `None` if the cache was dropped.
    pub async fn changed(&mut self) -> Option<Session> {
        self.inner
            .changed()
            .await
            .map(|entry| Session::from_entry(&entry))
    }
}
