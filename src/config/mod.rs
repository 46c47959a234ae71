//! Configuration management for setor
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. Command-line flags override individual fields in the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::balancer::BalanceParams;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Balancing parameters
    pub balance: BalanceConfig,

    /// Center geocoding configuration
    pub geocoding: GeocodingConfig,

    /// Run store configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Balancing parameters as configured
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Minimum points per surviving center
    pub min_pdv: usize,

    /// Maximum points per center
    pub max_pdv: usize,

    /// Travel-time ceiling in minutes
    pub max_time_min: f64,

    /// Average travel speed in km/h
    pub speed_kmh: f64,

    /// Iteration budget
    pub max_iterations: usize,

    /// Neighbor radius in km
    pub neighbor_radius_km: f64,
}

/// Center geocoding configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// JSON lookup table used as the geocoder chain
    pub table_path: Option<PathBuf>,

    /// City used when a center row leaves it blank
    pub fallback_city: Option<String>,

    /// State used when a center row leaves it blank
    pub fallback_state: Option<String>,
}

/// Run store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding run documents
    pub runs_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from `SETOR_*` environment variables
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = BalanceConfig::default();

        let balance = BalanceConfig {
            min_pdv: env_parse("SETOR_MIN_PDV").unwrap_or(defaults.min_pdv),
            max_pdv: env_parse("SETOR_MAX_PDV").unwrap_or(defaults.max_pdv),
            max_time_min: env_parse("SETOR_MAX_TIME_MIN").unwrap_or(defaults.max_time_min),
            speed_kmh: env_parse("SETOR_SPEED_KMH").unwrap_or(defaults.speed_kmh),
            max_iterations: env_parse("SETOR_MAX_ITERATIONS").unwrap_or(defaults.max_iterations),
            neighbor_radius_km: env_parse("SETOR_NEIGHBOR_RADIUS_KM")
                .unwrap_or(defaults.neighbor_radius_km),
        };

        let geocoding = GeocodingConfig {
            table_path: std::env::var("SETOR_GEOCODE_TABLE").ok().map(PathBuf::from),
            fallback_city: std::env::var("SETOR_FALLBACK_CITY").ok(),
            fallback_state: std::env::var("SETOR_FALLBACK_STATE").ok(),
        };

        let runs_dir = std::env::var("SETOR_RUNS_DIR")
            .unwrap_or_else(|_| String::from("data/runs"))
            .into();

        let log_level = std::env::var("SETOR_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format = std::env::var("SETOR_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            balance,
            geocoding,
            storage: StorageConfig { runs_dir },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.balance.speed_kmh.is_nan() || self.balance.speed_kmh <= 0.0 {
            anyhow::bail!("speed_kmh must be positive");
        }

        self.balance
            .to_params()
            .validate()
            .context("Invalid balance configuration")?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }
}

impl BalanceConfig {
    /// Engine parameters from this configuration
    #[must_use]
    pub fn to_params(&self) -> BalanceParams {
        BalanceParams {
            min_pdv: self.min_pdv,
            max_pdv: self.max_pdv,
            max_time_min: self.max_time_min,
            speed_kmh: self.speed_kmh,
            max_iterations: self.max_iterations,
            neighbor_radius_km: self.neighbor_radius_km,
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        let params = BalanceParams::default();
        Self {
            min_pdv: params.min_pdv,
            max_pdv: params.max_pdv,
            max_time_min: params.max_time_min,
            speed_kmh: params.speed_kmh,
            max_iterations: params.max_iterations,
            neighbor_radius_km: params.neighbor_radius_km,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("data/runs"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_engine_defaults() {
        let params = Config::default().balance.to_params();
        assert_eq!(params, BalanceParams::default());
        assert_eq!(params.max_pdv, 200);
        assert_eq!(params.max_time_min, 15.0);
    }

    #[test]
    fn test_invalid_speed() {
        let mut config = Config::default();
        config.balance.speed_kmh = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_above_max() {
        let mut config = Config::default();
        config.balance.min_pdv = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[balance]\nmax_pdv = 40\n").unwrap();
        assert_eq!(config.balance.max_pdv, 40);
        assert_eq!(config.balance.min_pdv, 1);
        assert_eq!(config.logging.format, "text");
    }
}
