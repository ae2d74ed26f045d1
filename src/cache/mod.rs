//! Response cache for the home feed.
//!
//! Rendered `GET` responses are kept for a fixed window and served as-is
//! until they expire, are evicted, or the cache is cleared. Writes do not
//! invalidate entries, so readers may see a feed up to one window old.
//!
//! ```toml
//! [cache]
//! enabled = true
//! page_ttl_seconds = 20
//! max_entries = 256
//! ```

mod config;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use middleware::{CacheState, response_cache_layer};
pub use store::{CachedResponse, ResponseCache, ResponseKey};
