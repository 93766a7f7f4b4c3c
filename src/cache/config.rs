//! Cache sizing and expiry configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

pub const DEFAULT_POST_LIST_TTL_SECS: u64 = 300;
pub const DEFAULT_POST_TTL_SECS: u64 = 600;
pub const DEFAULT_RAW_CONTENT_TTL_SECS: u64 = 900;

const DEFAULT_POST_LIST_CAPACITY: usize = 64;
const DEFAULT_POST_CAPACITY: usize = 512;
const DEFAULT_RAW_CONTENT_CAPACITY: usize = 512;

/// Per-namespace TTLs and LRU capacities for a content cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub post_list_ttl: Duration,
    pub post_ttl: Duration,
    pub raw_content_ttl: Duration,
    pub post_list_capacity: usize,
    pub post_capacity: usize,
    pub raw_content_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            post_list_ttl: Duration::from_secs(DEFAULT_POST_LIST_TTL_SECS),
            post_ttl: Duration::from_secs(DEFAULT_POST_TTL_SECS),
            raw_content_ttl: Duration::from_secs(DEFAULT_RAW_CONTENT_TTL_SECS),
            post_list_capacity: DEFAULT_POST_LIST_CAPACITY,
            post_capacity: DEFAULT_POST_CAPACITY,
            raw_content_capacity: DEFAULT_RAW_CONTENT_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub(crate) fn post_list_capacity_non_zero(&self) -> NonZeroUsize {
        non_zero(self.post_list_capacity)
    }

    pub(crate) fn post_capacity_non_zero(&self) -> NonZeroUsize {
        non_zero(self.post_capacity)
    }

    pub(crate) fn raw_content_capacity_non_zero(&self) -> NonZeroUsize {
        non_zero(self.raw_content_capacity)
    }
}

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value.max(1)).unwrap_or(NonZeroUsize::MIN)
}
