//! Configuration for celcache.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::CostCacheConfig;
use crate::types::errors::CelError;
use crate::CelResult;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Upper bound for the program cache budget (8 GiB).
pub const MAX_PROGRAM_CACHE_MB: u64 = 8192;

/// Upper bound for the JSON document cache budget (4 GiB).
pub const MAX_JSON_CACHE_MB: u64 = 4096;

/// Main configuration for celcache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Evaluation pipeline settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Cache budgets and sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Program cache budget in megabytes.
    #[serde(default = "default_program_cache_mb")]
    pub program_cache_mb: u64,

    /// JSON document cache budget in megabytes.
    #[serde(default = "default_json_cache_mb")]
    pub json_cache_mb: u64,

    /// Expected number of distinct program keys.
    #[serde(default = "default_program_counters")]
    pub program_counters: usize,

    /// Expected number of distinct JSON documents.
    #[serde(default = "default_json_counters")]
    pub json_counters: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            program_cache_mb: default_program_cache_mb(),
            json_cache_mb: default_json_cache_mb(),
            program_counters: default_program_counters(),
            json_counters: default_json_counters(),
        }
    }
}

fn default_program_cache_mb() -> u64 {
    128
}

fn default_json_cache_mb() -> u64 {
    64
}

fn default_program_counters() -> usize {
    10_000_000
}

fn default_json_counters() -> usize {
    1_000_000
}

impl CacheConfig {
    /// Cache configuration with the given budgets and default sizing.
    pub fn with_budgets(program_cache_mb: u64, json_cache_mb: u64) -> Self {
        Self {
            program_cache_mb,
            json_cache_mb,
            ..Self::default()
        }
    }

    /// Settings for the compiled program cache.
    pub fn program_cache(&self) -> CostCacheConfig {
        CostCacheConfig {
            max_cost: self.program_cache_mb.saturating_mul(BYTES_PER_MB),
            num_counters: self.program_counters,
        }
    }

    /// Settings for the parsed JSON document cache.
    pub fn json_cache(&self) -> CostCacheConfig {
        CostCacheConfig {
            max_cost: self.json_cache_mb.saturating_mul(BYTES_PER_MB),
            num_counters: self.json_counters,
        }
    }

    /// Checks budgets and sizing against the supported ranges.
    pub fn validate(&self) -> CelResult<()> {
        if !(1..=MAX_PROGRAM_CACHE_MB).contains(&self.program_cache_mb) {
            return Err(CelError::config(format!(
                "program_cache_mb must be between 1 and {}, got {}",
                MAX_PROGRAM_CACHE_MB, self.program_cache_mb
            )));
        }
        if !(1..=MAX_JSON_CACHE_MB).contains(&self.json_cache_mb) {
            return Err(CelError::config(format!(
                "json_cache_mb must be between 1 and {}, got {}",
                MAX_JSON_CACHE_MB, self.json_cache_mb
            )));
        }
        if self.program_counters == 0 || self.json_counters == 0 {
            return Err(CelError::config("key counters must be at least 1"));
        }
        Ok(())
    }
}

/// Evaluation pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Resolve plain field access without compiling.
    #[serde(default = "default_true")]
    pub fast_path: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_path: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> CelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> CelResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Tries to load configuration from the current directory or uses default.
    pub fn load_or_default() -> Self {
        Self::load("celcache.toml").unwrap_or_else(|_| Self::default_config())
    }

    /// Validates every section.
    pub fn validate(&self) -> CelResult<()> {
        self.cache.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.program_cache_mb, 128);
        assert_eq!(config.cache.json_cache_mb, 64);
        assert!(config.engine.fast_path);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_budgets_convert_to_bytes() {
        let cache = CacheConfig::with_budgets(2, 1);
        assert_eq!(cache.program_cache().max_cost, 2 * 1024 * 1024);
        assert_eq!(cache.json_cache().max_cost, 1024 * 1024);
        assert_eq!(cache.program_cache().num_counters, 10_000_000);
        assert_eq!(cache.json_cache().num_counters, 1_000_000);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(CacheConfig::with_budgets(0, 64).validate().is_err());
        assert!(CacheConfig::with_budgets(128, 5000).validate().is_err());

        let mut cache = CacheConfig::default();
        cache.json_counters = 0;
        assert!(cache.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            program_cache_mb = 256

            [engine]
            fast_path = false
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.program_cache_mb, 256);
        assert_eq!(config.cache.json_cache_mb, 64);
        assert!(!config.engine.fast_path);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("celcache.toml");

        let mut config = Config::default();
        config.cache.json_cache_mb = 32;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.cache.json_cache_mb, 32);
    }
}
