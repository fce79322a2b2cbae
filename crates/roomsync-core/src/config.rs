// ── Runtime client configuration ──
//
// Describes how to reach the marketplace backend and how the cache should
// behave. Never touches disk: the CLI (via roomsync-config) builds a
// `ClientConfig` and hands it in.

use std::time::Duration;

use url::Url;

/// Image host prefix that uploaded photo ids are appended to.
pub const DEFAULT_IMAGE_DELIVERY_PREFIX: &str = "https://imagedelivery.net/aSbksvJjax-AUC7qVnaC4A";

/// Configuration for one marketplace backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8000/api/v1/`.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How long a successful entry counts as fresh. `None` keeps entries
    /// fresh until they are explicitly invalidated.
    pub stale_time: Option<Duration>,
    /// Retries for transient (network) failures on ordinary queries.
    pub retries: u32,
    /// How far ahead, in calendar months, a stay may be booked.
    pub booking_horizon_months: u32,
    /// Public URL prefix for uploaded images; the image id and `/public`
    /// are appended.
    pub image_delivery_prefix: String,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
            stale_time: None,
            retries: 3,
            booking_horizon_months: 6,
            image_delivery_prefix: DEFAULT_IMAGE_DELIVERY_PREFIX.to_owned(),
        }
    }

    /// Public URL of an uploaded image.
    pub fn image_url(&self, image_id: &str) -> String {
        format!(
            "{}/{image_id}/public",
            self.image_delivery_prefix.trim_end_matches('/')
        )
    }
}
