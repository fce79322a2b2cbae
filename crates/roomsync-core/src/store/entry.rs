// ── Cache entries ──
//
// `RawEntry` is what a cache slot holds: the value is type-erased so one
// cache can hold rooms, users and availability results side by side.
// `CacheEntry<T>` is the typed, read-only snapshot handed to consumers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use super::key::QueryKey;
use crate::error::CoreError;

/// Lifecycle state of a cached resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Untyped slot contents.
#[derive(Clone, Default)]
pub(crate) struct RawEntry {
    pub status: CacheStatus,
    pub value: Option<ErasedValue>,
    pub error: Option<CoreError>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    /// Bumped by every invalidation that reaches this entry, so a request
    /// can tell whether it was invalidated while it ran.
    pub generation: u64,
}

impl RawEntry {
    pub(crate) fn success(value: ErasedValue) -> Self {
        Self {
            status: CacheStatus::Success,
            value: Some(value),
            error: None,
            fetched_at: Some(Utc::now()),
            stale: false,
            generation: 0,
        }
    }

    /// Whether a successful value has outlived `stale_time`.
    pub(crate) fn is_expired(&self, stale_time: Option<Duration>) -> bool {
        match (stale_time, self.fetched_at) {
            (Some(limit), Some(at)) => {
                let age = Utc::now().signed_duration_since(at);
                age.to_std().is_ok_and(|age| age >= limit)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for RawEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEntry")
            .field("status", &self.status)
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .field("fetched_at", &self.fetched_at)
            .field("stale", &self.stale)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Read-only snapshot of one cache entry.
///
/// `Success` implies `value` is present and `error` absent. `Error` carries
/// the error and keeps whatever value the previous success produced, so a
/// failed refresh never blanks out data already on screen.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub key: QueryKey,
    pub status: CacheStatus,
    pub value: Option<Arc<T>>,
    pub error: Option<CoreError>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            status: self.status,
            value: self.value.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            stale: self.stale,
        }
    }
}

impl<T: Send + Sync + 'static> CacheEntry<T> {
    /// A blank entry for a key the cache has never seen.
    pub fn idle(key: QueryKey) -> Self {
        Self {
            key,
            status: CacheStatus::Idle,
            value: None,
            error: None,
            fetched_at: None,
            stale: false,
        }
    }

    pub(crate) fn from_raw(key: QueryKey, raw: &RawEntry) -> Self {
        Self {
            key,
            status: raw.status,
            value: raw.value.clone().and_then(|v| v.downcast::<T>().ok()),
            error: raw.error.clone(),
            fetched_at: raw.fetched_at,
            stale: raw.stale,
        }
    }

    pub(crate) fn into_raw(self) -> RawEntry {
        RawEntry {
            status: self.status,
            value: self.value.map(|v| -> ErasedValue { v }),
            error: self.error,
            fetched_at: self.fetched_at,
            stale: self.stale,
            generation: 0,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn data(&self) -> Option<&T> {
        self.value.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.status == CacheStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == CacheStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == CacheStatus::Error
    }

    /// No request for this entry is running.
    pub fn is_settled(&self) -> bool {
        self.status != CacheStatus::Loading
    }

    /// Resolve a settled entry into its value or error.
    pub fn into_result(self) -> Result<Arc<T>, CoreError> {
        match (self.status, self.error, self.value) {
            (CacheStatus::Error, Some(err), _) => Err(err),
            (CacheStatus::Success, _, Some(value)) => Ok(value),
            (CacheStatus::Idle, _, _) => Err(CoreError::validation(format!(
                "{} has no data: the query is disabled or was cancelled",
                self.key
            ))),
            (status, _, _) => Err(CoreError::Server {
                message: format!("{} settled as {status} without data", self.key),
                status: None,
            }),
        }
    }
}
