// ── Query cache ──
//
// Key-addressed, reactive storage for server-derived resources.

mod cache;
mod entry;
mod key;

pub use cache::QueryCache;
pub use entry::{CacheEntry, CacheStatus};
pub(crate) use entry::RawEntry;
pub use key::{KeyMatch, KeyPart, QueryKey};
