// ── Mutation coordination ──
//
// Runs named writes and, once a write succeeds, marks the reads it affects
// stale. Every run is announced on a broadcast channel so observers (a
// progress line in the CLI, a toast in a UI) can follow along.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::store::{KeyMatch, QueryCache};

const EVENT_CHANNEL_SIZE: usize = 64;

/// Lifecycle signal for one mutation run.
#[derive(Debug, Clone)]
pub enum MutationEvent<O> {
    Started { name: &'static str },
    Succeeded { name: &'static str, value: O },
    Failed { name: &'static str, error: CoreError },
}

impl<O> MutationEvent<O> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { name } | Self::Succeeded { name, .. } | Self::Failed { name, .. } => {
                *name
            }
        }
    }
}

/// Executes writes against the backend and invalidates dependent reads.
pub struct MutationCoordinator<O: Clone> {
    cache: Arc<QueryCache>,
    events: broadcast::Sender<MutationEvent<O>>,
}

impl<O: Clone> MutationCoordinator<O> {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { cache, events }
    }

    /// Subscribe to lifecycle events of every subsequent run.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent<O>> {
        self.events.subscribe()
    }

    /// Run `mutation_fn(variables)`.
    ///
    /// On success every matcher in `invalidations` is applied to the cache.
    /// On failure the error is returned and no entry is touched.
    pub async fn run<V, F, Fut>(
        &self,
        name: &'static str,
        invalidations: &[KeyMatch],
        mutation_fn: F,
        variables: V,
    ) -> Result<O, CoreError>
    where
        F: FnOnce(V) -> Fut,
        Fut: Future<Output = Result<O, CoreError>>,
    {
        debug!(mutation = name, "mutation started");
        let _ = self.events.send(MutationEvent::Started { name });

        match mutation_fn(variables).await {
            Ok(value) => {
                let touched: usize = invalidations
                    .iter()
                    .map(|matcher| self.cache.invalidate(matcher))
                    .sum();
                info!(mutation = name, invalidated = touched, "mutation succeeded");
                let _ = self.events.send(MutationEvent::Succeeded {
                    name,
                    value: value.clone(),
                });
                Ok(value)
            }
            Err(error) => {
                warn!(mutation = name, %error, "mutation failed");
                let _ = self.events.send(MutationEvent::Failed {
                    name,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::query_key;

    fn seeded_cache() -> Arc<QueryCache> {
        let cache = Arc::new(QueryCache::new());
        cache.set_data(&query_key!["me"], "hana".to_owned());
        cache.set_data(&query_key!["rooms"], 3_u32);
        cache
    }

    #[tokio::test]
    async fn success_runs_invalidations() {
        let cache = seeded_cache();
        let mutations: MutationCoordinator<()> = MutationCoordinator::new(Arc::clone(&cache));

        mutations
            .run(
                "logout",
                &[KeyMatch::Exact(query_key!["me"])],
                |()| async { Ok(()) },
                (),
            )
            .await
            .unwrap();

        assert!(cache.get::<String>(&query_key!["me"]).unwrap().stale);
        assert!(!cache.get::<u32>(&query_key!["rooms"]).unwrap().stale);
    }

    #[tokio::test]
    async fn failure_touches_nothing() {
        let cache = seeded_cache();
        let mutations: MutationCoordinator<()> = MutationCoordinator::new(Arc::clone(&cache));
        let version = cache.version();

        let err = mutations
            .run(
                "logout",
                &[KeyMatch::Exact(query_key!["me"])],
                |()| async {
                    Err(CoreError::Auth {
                        status: 403,
                        message: "CSRF Failed".into(),
                    })
                },
                (),
            )
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert!(!cache.get::<String>(&query_key!["me"]).unwrap().stale);
        assert_eq!(cache.version(), version);
    }

    #[tokio::test]
    async fn lifecycle_events_are_broadcast() {
        let cache = seeded_cache();
        let mutations: MutationCoordinator<u32> = MutationCoordinator::new(cache);
        let mut events = mutations.subscribe();

        mutations
            .run("create_room", &[], |n: u32| async move { Ok(n * 2) }, 21)
            .await
            .unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            MutationEvent::Started { name: "create_room" }
        ));
        match events.recv().await.unwrap() {
            MutationEvent::Succeeded { name, value } => {
                assert_eq!(name, "create_room");
                assert_eq!(value, 42);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
