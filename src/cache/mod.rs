//! TTL-based memoization for upstream content.

pub mod config;
pub mod content;
pub(crate) mod lock;
pub mod ttl;

pub use config::CacheConfig;
pub use content::ContentCache;
pub use ttl::TtlCache;
