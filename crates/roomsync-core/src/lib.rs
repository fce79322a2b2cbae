//! Reactive data-sync layer between `roomsync-api` and its consumers.
//!
//! - **[`Marketplace`]**: central facade. Reads (`rooms()`, `room(pk)`,
//!   `reviews(pk)`, ...) go through the fetch coordinator and are served from
//!   the cache; writes go through [`Marketplace::execute`] as a [`Command`].
//!
//! - **[`QueryCache`]**: key-addressed storage built on `DashMap` +
//!   `tokio::sync::watch`. Entries carry a status (`idle`, `loading`,
//!   `success`, `error`), the last good value, and a `stale` flag set by
//!   invalidation.
//!
//! - **[`FetchCoordinator`]**: at most one request per key, stale-while-
//!   revalidate, scoped last-key-wins, transient-only retry.
//!
//! - **[`MutationCoordinator`]**: runs writes, invalidates dependent keys on
//!   success, and broadcasts `started` / `succeeded` / `failed` events.
//!
//! - **[`SessionManager`]**: derives [`Session`] from the `["me"]` entry.
//!
//! - **[`AvailabilityChecker`]**: per-room booking state machine that only
//!   enables booking after the backend confirms the selected dates.

pub mod booking;
pub mod command;
pub mod config;
pub mod error;
pub mod fetch;
pub mod marketplace;
pub mod mutation;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use booking::{AvailabilityChecker, AvailabilityState, BookingBackend, CheckPhase, DateRange};
pub use command::{Command, CommandResult};
pub use config::ClientConfig;
pub use error::CoreError;
pub use fetch::{FetchCoordinator, QueryOptions};
pub use marketplace::Marketplace;
pub use mutation::{MutationCoordinator, MutationEvent};
pub use session::{Session, SessionManager, SessionStream};
pub use store::{CacheEntry, CacheStatus, KeyMatch, KeyPart, QueryCache, QueryKey};
pub use stream::{EntryStream, EntryWatchStream};

pub use roomsync_api::OAuthProvider;
pub use roomsync_api::models::{
    Amenity, Availability, Booking, Category, CreateRoomRequest, Photo, Review, RoomDetail,
    RoomPk, RoomSummary, User,
};
