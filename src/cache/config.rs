//! Cache configuration.
//!
//! Controls entry lifetime and the background expiry sweep via `skprod.toml`.

use std::time::Duration;

use serde::Deserialize;

/// Five minutes, matching what the frontend memoizes API responses for.
pub const DEFAULT_TTL_MS: u64 = 300_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Cache configuration from `skprod.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime applied when `set` is called without an explicit TTL.
    pub default_ttl_ms: u64,
    /// Cadence of the background expiry sweep. Zero disables the sweeper.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: DEFAULT_TTL_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            default_ttl_ms: settings.default_ttl.as_millis() as u64,
            sweep_interval_ms: settings
                .sweep_interval
                .map(|interval| interval.as_millis() as u64)
                .unwrap_or(0),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Returns the sweep cadence, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl_ms, 300_000);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn converts_from_validated_settings() {
        let settings = crate::config::CacheSettings {
            default_ttl: Duration::from_secs(30),
            sweep_interval: None,
        };
        let config = CacheConfig::from(&settings);
        assert_eq!(config.default_ttl_ms, 30_000);
        assert!(config.sweep_interval().is_none());
    }

    #[test]
    fn zero_interval_disables_sweeper() {
        let config = CacheConfig {
            sweep_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.sweep_interval().is_none());
    }
}
