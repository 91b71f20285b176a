//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_SHARD_COUNT;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of shards (0 is clamped to 1 when the cache is built)
    pub shard_count: usize,
    /// Default TTL in seconds for items written with the default policy, 0 = never
    pub default_ttl: u64,
    /// Background sweep interval in seconds, 0 = no janitor
    pub cleanup_interval: u64,
    /// Base path of the per-shard snapshot files
    pub snapshot_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SHARD_COUNT` - Number of shards (default: 16)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 = never (default: 0)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds, 0 = disabled (default: 60)
    /// - `SNAPSHOT_PATH` - Snapshot base path (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            shard_count: parse_var("SHARD_COUNT").unwrap_or(defaults.shard_count),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            snapshot_path: env::var_os("SNAPSHOT_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Default TTL as a duration, None = never expire.
    pub fn ttl(&self) -> Option<Duration> {
        (self.default_ttl > 0).then(|| Duration::from_secs(self.default_ttl))
    }

    /// Janitor interval; zero disables the janitor.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            default_ttl: 0,
            cleanup_interval: 60,
            snapshot_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.shard_count, 16);
        assert_eq!(config.default_ttl, 0);
        assert_eq!(config.cleanup_interval, 60);
        assert!(config.snapshot_path.is_none());
        assert!(config.ttl().is_none());
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_config_durations() {
        let config = Config {
            default_ttl: 30,
            cleanup_interval: 0,
            ..Config::default()
        };
        assert_eq!(config.ttl(), Some(Duration::from_secs(30)));
        assert!(config.sweep_interval().is_zero());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("SHARD_COUNT");
        env::remove_var("DEFAULT_TTL");
        env::remove_var("CLEANUP_INTERVAL");
        env::remove_var("SNAPSHOT_PATH");

        let config = Config::from_env();
        assert_eq!(config.shard_count, 16);
        assert_eq!(config.default_ttl, 0);
        assert_eq!(config.cleanup_interval, 60);
        assert!(config.snapshot_path.is_none());
    }
}
