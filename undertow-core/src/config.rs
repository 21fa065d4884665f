//! Centralized configuration for Undertow.
//!
//! All tunable parameters are defined here. Values come from defaults, an
//! optional TOML file, then `UNDERTOW_*` environment variables, in that order.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Central configuration for all Undertow components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndertowConfig {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub resolver: ResolverConfig,
    pub simulation: SimulationConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Torrent pool lifecycle settings.
///
/// Idle eviction is driven by traffic: every newly added torrent schedules a
/// sweep `sweep_delay_ms` later. `sweep_interval_secs` adds a periodic sweep
/// on top of that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Seconds a torrent may go untouched before it is evicted
    pub idle_ttl_secs: u64,
    /// Delay between a new add and the sweep it triggers
    pub sweep_delay_ms: u64,
    /// Optional fixed sweep cadence
    pub sweep_interval_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 3600,
            sweep_delay_ms: 1000,
            sweep_interval_secs: None,
        }
    }
}

impl PoolConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_delay(&self) -> Duration {
        Duration::from_millis(self.sweep_delay_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Remote `.torrent` fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub fetch_timeout_secs: u64,
    pub max_metainfo_bytes: usize,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            max_metainfo_bytes: 10 * 1024 * 1024, // 10 MiB
            user_agent: "undertow/0.1.0".to_string(),
        }
    }
}

/// Parameters for the built-in simulated engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Artificial metadata fetch latency per add
    pub add_latency_ms: u64,
    /// Size of the main file in each simulated torrent
    pub main_file_bytes: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            add_latency_ms: 0,
            main_file_bytes: 64 * 1024 * 1024, // 64 MiB
        }
    }
}

impl UndertowConfig {
    /// Loads configuration from an optional TOML file and applies
    /// environment overrides.
    ///
    /// # Errors
    /// - `ConfigError::Io` - File could not be read
    /// - `ConfigError::Parse` - File is not valid TOML for this schema
    /// - `ConfigError::InvalidValue` - A value failed validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file; missing sections and keys keep their defaults.
    ///
    /// # Errors
    /// - `ConfigError::Io` - File could not be read
    /// - `ConfigError::Parse` - File is not valid TOML for this schema
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies `UNDERTOW_*` environment variable overrides.
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` - A variable is set but not parseable
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("UNDERTOW_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_number("UNDERTOW_PORT")? {
            self.server.port = port;
        }
        if let Some(ttl) = env_number("UNDERTOW_IDLE_TTL")? {
            self.pool.idle_ttl_secs = ttl;
        }
        if let Some(delay) = env_number("UNDERTOW_SWEEP_DELAY_MS")? {
            self.pool.sweep_delay_ms = delay;
        }
        if let Some(interval) = env_number("UNDERTOW_SWEEP_INTERVAL")? {
            self.pool.sweep_interval_secs = Some(interval);
        }
        Ok(())
    }

    /// Rejects settings the service cannot run with.
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` - Port or fetch timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.resolver.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.fetch_timeout_secs",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            pool: PoolConfig {
                idle_ttl_secs: 1,
                sweep_delay_ms: 0,
                sweep_interval_secs: None,
            },
            simulation: SimulationConfig {
                add_latency_ms: 0,
                main_file_bytes: 256 * 1024,
            },
            ..Default::default()
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: name,
                reason: format!("{raw:?}: {e}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = UndertowConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.pool.idle_ttl(), Duration::from_secs(3600));
        assert_eq!(config.pool.sweep_delay(), Duration::from_secs(1));
        assert_eq!(config.pool.sweep_interval(), None);
        assert_eq!(config.resolver.max_metainfo_bytes, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_disables_periodic_sweep() {
        let pool = PoolConfig {
            sweep_interval_secs: Some(0),
            ..PoolConfig::default()
        };
        assert_eq!(pool.sweep_interval(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 8080\n\n[pool]\nidle_ttl_secs = 120\nsweep_interval_secs = 30"
        )
        .unwrap();

        let config = UndertowConfig::from_file(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.pool.idle_ttl(), Duration::from_secs(120));
        assert_eq!(config.pool.sweep_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.pool.sweep_delay_ms, 1000);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let err = UndertowConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = UndertowConfig::from_file(Path::new("/nonexistent/undertow.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = UndertowConfig::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "server.port",
                ..
            })
        ));
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("UNDERTOW_PORT", "9090");
            std::env::set_var("UNDERTOW_IDLE_TTL", "45");
            std::env::set_var("UNDERTOW_SWEEP_DELAY_MS", "250");
        }

        let mut config = UndertowConfig::default();
        let result = config.apply_env_overrides();

        unsafe {
            std::env::remove_var("UNDERTOW_PORT");
            std::env::remove_var("UNDERTOW_IDLE_TTL");
            std::env::remove_var("UNDERTOW_SWEEP_DELAY_MS");
        }

        assert!(result.is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.pool.idle_ttl_secs, 45);
        assert_eq!(config.pool.sweep_delay_ms, 250);
    }

    #[test]
    fn test_testing_preset() {
        let config = UndertowConfig::for_testing();
        assert_eq!(config.pool.idle_ttl_secs, 1);
        assert_eq!(config.pool.sweep_delay(), Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
