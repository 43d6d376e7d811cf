//! Page cache for rendered feed listings.
//!
//! Pages are cached per (scope, page number) for a fixed TTL and are never
//! invalidated by writes; a new post shows up once the page expires or the
//! cache is cleared. Behaviour is controlled by the `[cache]` section:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! max_entries = 1024
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::PageKey;
pub use store::PageCache;
