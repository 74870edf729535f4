// ── Query store ──
//
// Keyed, deduplicating cache of remote collections plus the retry policy
// shared with the mutation path.

pub mod entry;
pub mod key;
pub mod observer;
pub mod query_cache;
pub mod retry;

pub use entry::{EntrySnapshot, FetchOptions, QueryStatus};
pub use key::QueryKey;
pub use observer::QueryObserver;
pub use query_cache::{InvalidateMode, Loader, QueryCache, loader};
pub use retry::{RetryPolicy, retry_with};
