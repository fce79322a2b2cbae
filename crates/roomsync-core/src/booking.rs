// ── Booking availability ──
//
// State machine gating booking creation on a server-side availability
// check for one room:
//
//   Idle ──select──▶ Checking ──response──▶ Resolved { ok }
//     ▲                  │                      │
//     └──────clear───────┴──────────────────────┘
//
// Every selection keys its check by `(room, check_in, check_out)` under a
// scope owned by the checker, so re-picking dates before a response arrives
// abandons the earlier request instead of letting it overwrite the newer
// state. A check that was invalidated (for instance by a booking) no longer
// counts as confirmed and is fetched again on the next read.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, Months, NaiveDate};
use futures_util::future::BoxFuture;
use serde::Serialize;
use strum::Display;
use tokio::sync::watch;
use tracing::debug;

use roomsync_api::models::{Availability, Booking, RoomPk};

use crate::error::CoreError;
use crate::fetch::{FetchCoordinator, QueryOptions};
use crate::query_key;
use crate::store::{CacheStatus, KeyMatch, QueryKey};

/// Shown when the backend reports the dates as taken.
pub const UNAVAILABLE_WARNING: &str = "Can't book on those dates, sorry.";

/// Shown when the check itself failed; booking stays disabled.
pub const CHECK_FAILED_WARNING: &str = "Couldn't confirm availability for those dates.";

// ── DateRange ────────────────────────────────────────────────────

/// A validated stay: `check_in < check_out`, both inside the booking
/// window starting today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl DateRange {
    /// Validate a selection against `[today, today + horizon_months]`.
    ///
    /// Month arithmetic is calendar-aware and clamps to the end of shorter
    /// months (Aug 31 + 6 months = Feb 28/29).
    pub fn new(
        check_in: NaiveDate,
        check_out: NaiveDate,
        today: NaiveDate,
        horizon_months: u32,
    ) -> Result<Self, CoreError> {
        if check_in >= check_out {
            return Err(CoreError::validation(format!(
                "check-out ({check_out}) must be after check-in ({check_in})"
            )));
        }
        if check_in < today {
            return Err(CoreError::validation(format!(
                "check-in ({check_in}) is in the past"
            )));
        }
        let last = today
            .checked_add_months(Months::new(horizon_months))
            .ok_or_else(|| CoreError::validation("booking window overflows the calendar"))?;
        if check_out > last {
            return Err(CoreError::validation(format!(
                "check-out ({check_out}) is beyond the booking window ending {last}"
            )));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.check_in, self.check_out)
    }
}

/// Cache key of the availability check for one room and stay.
pub fn check_key(room: RoomPk, range: &DateRange) -> QueryKey {
    query_key!["check", room, (range.check_in, range.check_out)]
}

// ── AvailabilityState ────────────────────────────────────────────

/// Which state of the checker a snapshot is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    Idle,
    RangeSelected,
    Checking,
    Resolved,
}

/// Snapshot of the checker for the currently selected range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AvailabilityState {
    pub range: Option<DateRange>,
    pub result: Option<Availability>,
    pub checking: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<CoreError>,
}

impl AvailabilityState {
    pub fn phase(&self) -> CheckPhase {
        match (&self.range, self.checking, &self.result) {
            (None, _, _) => CheckPhase::Idle,
            (Some(_), true, _) => CheckPhase::Checking,
            (Some(_), false, Some(_)) => CheckPhase::Resolved,
            (Some(_), false, None) => CheckPhase::RangeSelected,
        }
    }

    /// Booking is allowed only for a resolved check that said yes.
    pub fn can_book(&self) -> bool {
        self.phase() == CheckPhase::Resolved
            && self.error.is_none()
            && self.result.is_some_and(|r| r.ok)
    }

    /// Message to show next to the booking button, if any.
    pub fn warning(&self) -> Option<&'static str> {
        if self.range.is_none() || self.checking {
            return None;
        }
        if self.error.is_some() {
            return Some(CHECK_FAILED_WARNING);
        }
        match self.result {
            Some(Availability { ok: false }) => Some(UNAVAILABLE_WARNING),
            _ => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn serialize_error<S: serde::Serializer>(
    error: &Option<CoreError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

// ── Backend seam ─────────────────────────────────────────────────

/// The two server calls the checker depends on.
pub trait BookingBackend: Send + Sync + 'static {
    fn check(
        &self,
        room: RoomPk,
        range: DateRange,
    ) -> BoxFuture<'static, Result<Availability, CoreError>>;

    fn book(
        &self,
        room: RoomPk,
        range: DateRange,
        guests: u32,
    ) -> BoxFuture<'static, Result<Booking, CoreError>>;
}

type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

static NEXT_CHECKER: AtomicU64 = AtomicU64::new(1);

// ── AvailabilityChecker ──────────────────────────────────────────

/// Availability state machine for one room.
///
/// Clones share the selection and the scope. Separate checkers for the
/// same room share cached answers but never abandon each other's checks.
#[derive(Clone)]
pub struct AvailabilityChecker {
    room: RoomPk,
    scope: String,
    fetcher: FetchCoordinator,
    backend: Arc<dyn BookingBackend>,
    options: QueryOptions,
    horizon_months: u32,
    today: Today,
    range: Arc<watch::Sender<Option<DateRange>>>,
}

impl AvailabilityChecker {
    pub fn new(
        room: RoomPk,
        fetcher: FetchCoordinator,
        backend: Arc<dyn BookingBackend>,
        horizon_months: u32,
    ) -> Self {
        let (range, _) = watch::channel(None);
        let scope = format!(
            "availability:{room}:{}",
            NEXT_CHECKER.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            room,
            options: QueryOptions::default().scope(scope.clone()),
            scope,
            fetcher,
            backend,
            horizon_months,
            today: Arc::new(|| Local::now().date_naive()),
            range: Arc::new(range),
        }
    }

    /// Pin "today" to a fixed date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Arc::new(move || today);
        self
    }

    /// Override retry and staleness for availability checks. The scope is
    /// always the checker's own.
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = QueryOptions {
            scope: Some(self.scope.clone()),
            ..options
        };
        self
    }

    pub fn room(&self) -> RoomPk {
        self.room
    }

    pub fn range(&self) -> Option<DateRange> {
        *self.range.borrow()
    }

    /// Select a stay. Both ends change together; invalid dates are rejected
    /// without touching the network or the current selection.
    pub fn select(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<AvailabilityState, CoreError> {
        let range = DateRange::new(check_in, check_out, (self.today)(), self.horizon_months)?;
        debug!(room = self.room, %range, "dates selected");
        self.range.send_replace(Some(range));

        // Picking dates again is an explicit retry of a check that failed.
        let key = check_key(self.room, &range);
        let cache = self.fetcher.cache();
        if cache.get_or_idle::<Availability>(&key).is_error() {
            debug!(room = self.room, %range, "retrying failed availability check");
            cache.invalidate(&KeyMatch::Exact(key));
        }
        Ok(self.state())
    }

    /// Drop the selection (e.g. the visitor navigated away). Any check still
    /// running is abandoned.
    pub fn clear(&self) {
        self.range.send_replace(None);
        self.fetcher.release_scope(&self.scope);
    }

    /// Snapshot for the current selection. Starts the check when the
    /// cached answer is missing or has been invalidated.
    pub fn state(&self) -> AvailabilityState {
        let Some(range) = self.range() else {
            return AvailabilityState::default();
        };
        let backend = Arc::clone(&self.backend);
        let room = self.room;
        let entry = self
            .fetcher
            .ensure(check_key(room, &range), &self.options, move |_| {
                backend.check(room, range)
            });

        match entry.status {
            CacheStatus::Loading => AvailabilityState {
                range: Some(range),
                result: None,
                checking: true,
                error: None,
            },
            CacheStatus::Success if !entry.stale => AvailabilityState {
                range: Some(range),
                result: entry.data().copied(),
                checking: false,
                error: None,
            },
            CacheStatus::Error => AvailabilityState {
                range: Some(range),
                result: None,
                checking: false,
                error: entry.error,
            },
            CacheStatus::Success | CacheStatus::Idle => AvailabilityState {
                range: Some(range),
                ..AvailabilityState::default()
            },
        }
    }

    /// Wait for the current selection's check to finish.
    pub async fn settled(&self) -> AvailabilityState {
        loop {
            let state = self.state();
            let Some(range) = state.range.filter(|_| state.checking) else {
                return state;
            };
            self.fetcher
                .settled::<Availability>(&check_key(self.room, &range))
                .await;
        }
    }

    /// Book the selected stay. Refused locally unless the check for the
    /// current selection resolved with `ok = true` and has not been
    /// invalidated since. A successful booking invalidates that check.
    pub async fn book(&self, guests: u32) -> Result<Booking, CoreError> {
        let state = self.state();
        let Some(range) = state.range else {
            return Err(CoreError::validation("select dates before booking"));
        };
        if !state.can_book() {
            return Err(CoreError::validation(
                state.warning().unwrap_or("availability has not been confirmed yet"),
            ));
        }
        if guests == 0 {
            return Err(CoreError::validation("at least one guest is required"));
        }
        let booking = self.backend.book(self.room, range, guests).await?;
        self.fetcher
            .cache()
            .invalidate(&KeyMatch::Exact(check_key(self.room, &range)));
        Ok(booking)
    }

    /// Matchers for every availability check of `room`.
    pub fn invalidations(room: RoomPk) -> KeyMatch {
        KeyMatch::Prefix(query_key!["check", room])
    }
}
