// roomsync-api: Async Rust client for the room marketplace REST API (`/api/v1/`)

pub mod auth;
pub mod bookings;
pub mod client;
pub mod error;
pub mod media;
pub mod models;
pub mod rooms;
pub mod transport;

pub use auth::OAuthProvider;
pub use client::ApiClient;
pub use error::Error;
pub use transport::TransportConfig;
