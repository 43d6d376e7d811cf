//! Page cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(20);
const DEFAULT_MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false every lookup computes and nothing is stored.
    pub enabled: bool,
    /// Lifetime of a stored page; entries older than this are recomputed.
    pub ttl: Duration,
    /// Upper bound on stored pages; least recently used pages are evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl,
            max_entries: settings.max_entries.get(),
        }
    }
}

impl CacheConfig {
    /// Capacity as `NonZeroUsize`, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.ttl, Duration::from_secs(20));
        assert_eq!(config.max_entries, 1024);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            max_entries: 0,
            ..Default::default()
        };
        assert_eq!(config.max_entries_non_zero().get(), 1);
    }
}
