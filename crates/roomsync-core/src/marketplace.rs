// ── Marketplace facade ──
//
// Wires the REST client into the cache, the coordinators, the session
// manager, and per-room availability checkers. Reads go through the Fetch
// Coordinator; writes go through `execute()` so their invalidations run.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::debug;

use roomsync_api::models::{
    Amenity, Availability, Booking, Category, CreateBookingRequest, Review, RoomDetail, RoomPk,
    RoomSummary,
};
use roomsync_api::{ApiClient, TransportConfig};

use crate::booking::{AvailabilityChecker, BookingBackend, DateRange};
use crate::command::{Command, CommandResult};
use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::fetch::{FetchCoordinator, QueryOptions};
use crate::mutation::{MutationCoordinator, MutationEvent};
use crate::query_key;
use crate::session::{Session, SessionManager};
use crate::store::{CacheEntry, KeyMatch, QueryCache, QueryKey};

type ApiFetch<T> = Box<dyn Fn(QueryKey) -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync>;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MarketplaceInner>`; clones share one cache,
/// one cookie jar, and one set of in-flight requests.
#[derive(Clone)]
pub struct Marketplace {
    inner: Arc<MarketplaceInner>,
}

struct MarketplaceInner {
    config: ClientConfig,
    api: Arc<ApiClient>,
    fetcher: FetchCoordinator,
    mutations: MutationCoordinator<CommandResult>,
    session: SessionManager,
}

impl Marketplace {
    /// Build a client with its own cookie-backed HTTP session.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::default()
            .with_timeout(config.timeout)
            .with_cookie_jar();
        let api = ApiClient::new(config.base_url.clone(), &transport)?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    /// Build on top of an existing API client.
    pub fn with_api(config: ClientConfig, api: Arc<ApiClient>) -> Self {
        let cache = Arc::new(QueryCache::new());
        let fetcher = FetchCoordinator::new(Arc::clone(&cache));
        let mutations = MutationCoordinator::new(Arc::clone(&cache));

        let me_api = Arc::clone(&api);
        let session = SessionManager::new(fetcher.clone(), move || {
            let api = Arc::clone(&me_api);
            async move { api.me().await.map_err(CoreError::from) }
        });

        Self {
            inner: Arc::new(MarketplaceInner {
                config,
                api,
                fetcher,
                mutations,
                session,
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.inner.api
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        self.inner.fetcher.cache()
    }

    pub fn fetcher(&self) -> &FetchCoordinator {
        &self.inner.fetcher
    }

    /// Default options for resource queries.
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default()
            .stale_time(self.inner.config.stale_time)
            .retry(self.inner.config.retries)
    }

    /// Mark matching entries stale.
    pub fn invalidate(&self, matcher: &KeyMatch) -> usize {
        self.cache().invalidate(matcher)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn rooms(&self) -> CacheEntry<Vec<RoomSummary>> {
        self.ensure(query_key!["rooms"], self.api_fetch(|api| async move { api.list_rooms().await }))
    }

    pub async fn load_rooms(&self) -> Result<Arc<Vec<RoomSummary>>, CoreError> {
        self.load(query_key!["rooms"], self.api_fetch(|api| async move { api.list_rooms().await }))
            .await
    }

    pub fn room(&self, pk: RoomPk) -> CacheEntry<RoomDetail> {
        self.ensure(Self::room_key(pk), self.room_fetch(pk))
    }

    pub async fn load_room(&self, pk: RoomPk) -> Result<Arc<RoomDetail>, CoreError> {
        self.load(Self::room_key(pk), self.room_fetch(pk)).await
    }

    pub fn reviews(&self, pk: RoomPk) -> CacheEntry<Vec<Review>> {
        self.ensure(Self::reviews_key(pk), self.reviews_fetch(pk))
    }

    pub async fn load_reviews(&self, pk: RoomPk) -> Result<Arc<Vec<Review>>, CoreError> {
        self.load(Self::reviews_key(pk), self.reviews_fetch(pk)).await
    }

    pub fn amenities(&self) -> CacheEntry<Vec<Amenity>> {
        self.ensure(
            query_key!["amenities"],
            self.api_fetch(|api| async move { api.list_amenities().await }),
        )
    }

    pub async fn load_amenities(&self) -> Result<Arc<Vec<Amenity>>, CoreError> {
        self.load(
            query_key!["amenities"],
            self.api_fetch(|api| async move { api.list_amenities().await }),
        )
        .await
    }

    pub fn categories(&self) -> CacheEntry<Vec<Category>> {
        self.ensure(
            query_key!["categories"],
            self.api_fetch(|api| async move { api.list_categories().await }),
        )
    }

    pub async fn load_categories(&self) -> Result<Arc<Vec<Category>>, CoreError> {
        self.load(
            query_key!["categories"],
            self.api_fetch(|api| async move { api.list_categories().await }),
        )
        .await
    }

    // ── Session & booking ────────────────────────────────────────────

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Current session; starts the `["me"]` lookup if needed.
    pub fn session(&self) -> Session {
        self.inner.session.session()
    }

    /// Session once the `["me"]` lookup has settled.
    pub async fn resolve_session(&self) -> Session {
        self.inner.session.resolve().await
    }

    /// Availability checker for one room. Checkers for the same room share
    /// cached answers; each owns its selection, so one re-picking dates
    /// never abandons another's check.
    pub fn availability(&self, pk: RoomPk) -> AvailabilityChecker {
        AvailabilityChecker::new(
            pk,
            self.inner.fetcher.clone(),
            Arc::new(self.clone()),
            self.inner.config.booking_horizon_months,
        )
        .with_options(self.query_options())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run a write and apply its invalidations on success.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let name = cmd.name();
        let invalidations = cmd.invalidations();
        let this = self.clone();
        self.inner
            .mutations
            .run(
                name,
                &invalidations,
                move |cmd| async move { route_command(&this, cmd).await },
                cmd,
            )
            .await
    }

    /// Lifecycle events for every subsequent [`execute`](Self::execute).
    pub fn mutation_events(&self) -> broadcast::Receiver<MutationEvent<CommandResult>> {
        self.inner.mutations.subscribe()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn room_key(pk: RoomPk) -> QueryKey {
        query_key!["rooms", pk]
    }

    fn reviews_key(pk: RoomPk) -> QueryKey {
        query_key!["rooms", pk, "reviews"]
    }

    fn room_fetch(&self, pk: RoomPk) -> ApiFetch<RoomDetail> {
        self.api_fetch(move |api| async move { api.get_room(pk).await })
    }

    fn reviews_fetch(&self, pk: RoomPk) -> ApiFetch<Vec<Review>> {
        self.api_fetch(move |api| async move { api.room_reviews(pk).await })
    }

    /// Adapt an API call into a fetch function for the coordinator.
    fn api_fetch<T, F, Fut>(&self, call: F) -> ApiFetch<T>
    where
        T: Send + 'static,
        F: Fn(Arc<ApiClient>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, roomsync_api::Error>> + Send + 'static,
    {
        let api = Arc::clone(&self.inner.api);
        Box::new(move |key| {
            debug!(%key, "querying");
            call(Arc::clone(&api)).map(|res| res.map_err(CoreError::from)).boxed()
        })
    }

    fn ensure<T: Send + Sync + 'static>(&self, key: QueryKey, fetch: ApiFetch<T>) -> CacheEntry<T> {
        self.inner.fetcher.ensure(key, &self.query_options(), fetch)
    }

    async fn load<T: Send + Sync + 'static>(
        &self,
        key: QueryKey,
        fetch: ApiFetch<T>,
    ) -> Result<Arc<T>, CoreError> {
        self.inner
            .fetcher
            .fetch(key, &self.query_options(), fetch)
            .await
            .into_result()
    }
}

impl BookingBackend for Marketplace {
    fn check(
        &self,
        room: RoomPk,
        range: DateRange,
    ) -> BoxFuture<'static, Result<Availability, CoreError>> {
        let api = Arc::clone(&self.inner.api);
        async move {
            api.check_booking(room, range.check_in(), range.check_out())
                .await
                .map_err(CoreError::from)
        }
        .boxed()
    }

    fn book(
        &self,
        room: RoomPk,
        range: DateRange,
        guests: u32,
    ) -> BoxFuture<'static, Result<Booking, CoreError>> {
        let this = self.clone();
        async move {
            let cmd = Command::CreateBooking {
                room,
                check_in: range.check_in(),
                check_out: range.check_out(),
                guests,
            };
            match this.execute(cmd).await? {
                CommandResult::Booking(booking) => Ok(booking),
                other => Err(CoreError::Server {
                    message: format!("unexpected result for create_booking: {other:?}"),
                    status: None,
                }),
            }
        }
        .boxed()
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(mp: &Marketplace, cmd: Command) -> Result<CommandResult, CoreError> {
    let api = &mp.inner.api;

    match cmd {
        // ── Session ──────────────────────────────────────────────
        Command::Login { email, password } => {
            let resp = api.login(&email, &password).await?;
            Ok(CommandResult::LoggedIn(resp.user))
        }
        Command::OAuthLogin { provider, code } => {
            let resp = api.oauth_login(provider, &code).await?;
            Ok(CommandResult::LoggedIn(resp.user))
        }
        Command::Logout => {
            api.logout().await?;
            api.clear_csrf_token();
            Ok(CommandResult::Ok)
        }

        // ── Hosting ──────────────────────────────────────────────
        Command::CreateRoom(body) => {
            let room = api.create_room(&body).await?;
            Ok(CommandResult::Room(room))
        }
        Command::UploadRoomPhoto {
            room,
            file_name,
            bytes,
            description,
        } => {
            let target = api.get_upload_url().await?;
            let uploaded = api
                .upload_image(&target.upload_url, &file_name, bytes)
                .await?;
            let file = mp.inner.config.image_url(&uploaded.result.id);
            let photo = api.create_photo(room, &description, &file).await?;
            Ok(CommandResult::Photo(photo))
        }

        // ── Bookings ─────────────────────────────────────────────
        Command::CreateBooking {
            room,
            check_in,
            check_out,
            guests,
        } => {
            let body = CreateBookingRequest {
                check_in,
                check_out,
                guests,
            };
            let booking = api.create_booking(room, &body).await?;
            Ok(CommandResult::Booking(booking))
        }
    }
}
