//! Fragment cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECONDS: u64 = 20;
const DEFAULT_FRAGMENT_LIMIT: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(limit) => limit,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone)]
pub struct FragmentCacheConfig {
    /// When false every lookup misses and nothing is stored.
    pub enabled: bool,
    /// Lifetime of a stored fragment.
    pub ttl: Duration,
    /// Maximum number of stored fragments across all names.
    pub limit: NonZeroUsize,
}

impl Default for FragmentCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            limit: DEFAULT_FRAGMENT_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for FragmentCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: Duration::from_secs(u64::from(settings.index_page_ttl_seconds.get())),
            limit: settings.fragment_limit,
        }
    }
}
