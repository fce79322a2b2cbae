// ── Query keys ──
//
// A key identifies one server-derived resource by the request that
// produces it. Keys compare structurally, element by element; date parts
// compare by calendar day, so two timestamps on the same day produce the
// same key.

use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone};

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(u64),
    Date(NaiveDate),
    List(Vec<KeyPart>),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::List(parts) => write_list(f, parts),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<u64> for KeyPart {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        Self::Int(u64::from(n))
    }
}

impl From<NaiveDate> for KeyPart {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// Timestamps collapse to their calendar day in their own time zone.
impl<Tz: TimeZone> From<DateTime<Tz>> for KeyPart {
    fn from(t: DateTime<Tz>) -> Self {
        Self::Date(t.date_naive())
    }
}

impl From<Vec<KeyPart>> for KeyPart {
    fn from(parts: Vec<KeyPart>) -> Self {
        Self::List(parts)
    }
}

impl<A: Into<KeyPart>, B: Into<KeyPart>> From<(A, B)> for KeyPart {
    fn from((a, b): (A, B)) -> Self {
        Self::List(vec![a.into(), b.into()])
    }
}

/// Ordered, immutable identity of a cached resource, e.g.
/// `["rooms", 42, "reviews"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` if `prefix` equals the first `prefix.len()` parts of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.0)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, parts: &[KeyPart]) -> fmt::Result {
    f.write_str("[")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{part}")?;
    }
    f.write_str("]")
}

/// Build a [`QueryKey`] from anything convertible into [`KeyPart`]s.
///
/// ```
/// use roomsync_core::query_key;
/// let key = query_key!["rooms", 42_u64, "reviews"];
/// assert_eq!(key.to_string(), r#"["rooms", 42, "reviews"]"#);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($part:expr),* $(,)?) => {
        $crate::store::QueryKey::new(vec![$($crate::store::KeyPart::from($part)),*])
    };
}

/// Selects the entries an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMatch {
    /// Exactly this key.
    Exact(QueryKey),
    /// Every key that starts with this one, including the key itself.
    Prefix(QueryKey),
}

impl KeyMatch {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Exact(k) => k == key,
            Self::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

impl fmt::Display for KeyMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(k) => write!(f, "{k}"),
            Self::Prefix(k) => write!(f, "{k}*"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn timestamps_on_same_day_make_equal_keys() {
        let morning = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 6, 1, 22, 30, 0).unwrap();
        let a = query_key!["check", 42_u64, (morning, day(2025, 6, 3))];
        let b = query_key!["check", 42_u64, (evening, day(2025, 6, 3))];
        assert_eq!(a, b);
    }

    #[test]
    fn timestamps_use_their_own_calendar_day() {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let late = kst.with_ymd_and_hms(2025, 6, 1, 23, 0, 0).unwrap();
        assert_eq!(KeyPart::from(late), KeyPart::Date(day(2025, 6, 1)));
    }

    #[test]
    fn different_days_make_different_keys() {
        let a = query_key!["check", 42_u64, (day(2025, 6, 1), day(2025, 6, 3))];
        let b = query_key!["check", 42_u64, (day(2025, 6, 1), day(2025, 6, 4))];
        assert_ne!(a, b);
    }

    #[test]
    fn string_and_int_parts_are_distinct() {
        assert_ne!(query_key!["rooms", "42"], query_key!["rooms", 42_u64]);
    }

    #[test]
    fn prefix_match_covers_children() {
        let prefix = KeyMatch::Prefix(query_key!["rooms", 42_u64]);
        assert!(prefix.matches(&query_key!["rooms", 42_u64]));
        assert!(prefix.matches(&query_key!["rooms", 42_u64, "reviews"]));
        assert!(!prefix.matches(&query_key!["rooms", 7_u64]));
        assert!(!prefix.matches(&query_key!["rooms"]));

        let exact = KeyMatch::Exact(query_key!["rooms", 42_u64]);
        assert!(!exact.matches(&query_key!["rooms", 42_u64, "reviews"]));
    }

    #[test]
    fn display_renders_nested_lists() {
        let key = query_key!["check", 42_u64, (day(2025, 6, 1), day(2025, 6, 3))];
        assert_eq!(key.to_string(), r#"["check", 42, [2025-06-01, 2025-06-03]]"#);
    }
}
