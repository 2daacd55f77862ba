//! Tagged response cache.
//!
//! An in-process key/value store for memoizing API responses:
//!
//! - **TTL**: every entry expires after its own lifetime (five minutes unless
//!   the caller says otherwise) and is evicted lazily on the next read.
//! - **Tags**: entries carry free-form labels such as `"projects"`; one call
//!   to [`TagCache::invalidate_by_tag`] drops every entry sharing a label.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! default_ttl_ms = 300000
//! sweep_interval_ms = 60000
//! ```

mod clock;
mod config;
mod lock;
mod registry;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DEFAULT_SWEEP_INTERVAL_MS, DEFAULT_TTL_MS};
pub use registry::TagIndex;
pub use store::{CacheEntry, SetOptions, TagCache};
pub use sweeper::{spawn_configured_sweeper, spawn_expiry_sweeper};
