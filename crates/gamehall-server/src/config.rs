//! Server configuration.

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Bounded exponential backoff for engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further retry. Default: 1s.
    pub base_delay: Duration,
    /// Upper bound on any single delay. Default: 5s.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Configuration for the game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default: 0.0.0.0:8080.
    pub addr: SocketAddr,
    /// Distinct game types kept in the engine cache. Default: 10.
    pub engine_cache_capacity: usize,
    pub retry: RetryPolicy,
    /// Matches with no activity for this long are removed. Default: 30min.
    pub match_idle_timeout: Duration,
    /// How often the reaper looks for idle matches. Default: 60s.
    pub reap_interval: Duration,
    /// Fixed seed for match randomness; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            engine_cache_capacity: 10,
            retry: RetryPolicy::default(),
            match_idle_timeout: Duration::from_secs(30 * 60),
            reap_interval: Duration::from_secs(60),
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = parse(&lookup, "SERVER_ADDR")? {
            config.addr = addr;
        }
        if let Some(capacity) = parse(&lookup, "GAMEHALL_ENGINE_CACHE_CAPACITY")? {
            config.engine_cache_capacity = capacity;
        }
        if let Some(attempts) = parse(&lookup, "GAMEHALL_RETRY_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse(&lookup, "GAMEHALL_RETRY_BASE_MS")? {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&lookup, "GAMEHALL_RETRY_MAX_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse(&lookup, "GAMEHALL_MATCH_IDLE_SECS")? {
            config.match_idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "GAMEHALL_REAP_INTERVAL_SECS")? {
            config.reap_interval = Duration::from_secs(secs);
        }
        config.rng_seed = parse(&lookup, "GAMEHALL_RNG_SEED")?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks:
    /// - `engine_cache_capacity >= 1`
    /// - `retry.max_attempts >= 1`
    /// - `retry.base_delay <= retry.max_delay`
    /// - `match_idle_timeout` and `reap_interval` are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "engine_cache_capacity must be >= 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                reason: "retry.max_attempts must be >= 1".to_string(),
            });
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "retry.base_delay ({:?}) exceeds retry.max_delay ({:?})",
                    self.retry.base_delay, self.retry.max_delay
                ),
            });
        }
        if self.match_idle_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                reason: "match_idle_timeout must be > 0".to_string(),
            });
        }
        if self.reap_interval.is_zero() {
            return Err(ConfigError::Invalid {
                reason: "reap_interval must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine_cache_capacity, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.match_idle_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for(2), Duration::from_secs(2));
        assert_eq!(retry.delay_for(3), Duration::from_secs(4));
        assert_eq!(retry.delay_for(4), Duration::from_secs(5));
        assert_eq!(retry.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("GAMEHALL_ENGINE_CACHE_CAPACITY", "4"),
            ("GAMEHALL_RETRY_BASE_MS", "10"),
            ("GAMEHALL_RETRY_MAX_MS", "50"),
            ("GAMEHALL_RNG_SEED", "7"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.engine_cache_capacity, 4);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_delay, Duration::from_millis(50));
        assert_eq!(config.rng_seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_values_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("GAMEHALL_RETRY_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidVar { var: "GAMEHALL_RETRY_ATTEMPTS", .. }
        ));

        let config = ServerConfig::from_lookup(lookup(&[("GAMEHALL_ENGINE_CACHE_CAPACITY", "0")]))
            .unwrap();
        assert!(config.validate().is_err());

        let config = ServerConfig::from_lookup(lookup(&[("GAMEHALL_RETRY_BASE_MS", "9000")]))
            .unwrap();
        assert!(config.validate().is_err());
    }
}
