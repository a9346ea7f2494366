//! Service configuration
//!
//! Loaded from `config.toml` (falling back to `config.example.toml`), with
//! secrets taken from the environment / `.env`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::export::DEFAULT_WALLET_LIMIT;

/// Environment variable that overrides `rpc.api_key`
pub const API_KEY_ENV: &str = "HELIUS_API_KEY";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rpc: RpcConfig,
    pub analysis: AnalysisConfig,
    pub jobs: JobsConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

/// Defaults applied to submissions that don't override them
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_usd_filter: f64,
    /// Signatures fetched per analysis
    pub transaction_limit: usize,
    /// Wallets kept in the wallet-tracker export
    pub wallet_count: usize,
    pub max_credits_per_analysis: u32,
    pub default_time_window_hours: u32,
    pub sol_price_usd: f64,
    pub dust_floor_lamports: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    pub max_concurrent_jobs: usize,
    pub fetch_timeout_secs: u64,
    pub notification_buffer: usize,
    /// Finished jobs kept in memory for status lookups and metrics
    pub max_retained_jobs: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub results_dir: PathBuf,
    pub exports_dir: PathBuf,
    pub wal_mode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5003,
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://mainnet.helius-rpc.com".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_usd_filter: 50.0,
            transaction_limit: 500,
            wallet_count: DEFAULT_WALLET_LIMIT,
            max_credits_per_analysis: 1000,
            default_time_window_hours: 24,
            sol_price_usd: 200.0,
            dust_floor_lamports: 100_000,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            fetch_timeout_secs: 30,
            notification_buffer: 256,
            max_retained_jobs: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/analyzed_tokens.db"),
            results_dir: PathBuf::from("analysis_results"),
            exports_dir: PathBuf::from("axiom_exports"),
            wal_mode: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn load_or_default() -> Result<Self> {
        // Try config.toml first, then config.example.toml
        let mut config = Self::load("config.toml")
            .or_else(|_| Self::load("config.example.toml"))
            .context("Failed to load configuration")?;

        dotenv::dotenv().ok();
        config.apply_env_overrides(env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    /// Secrets never live in the TOML file in production
    pub fn apply_env_overrides(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.rpc.api_key = key.trim().to_string();
        }
    }

    /// Validate configuration values. `require_api_key` is set by the binary;
    /// library users (and tests) only get a warning.
    pub fn validate(&self, require_api_key: bool) -> Result<()> {
        if self.jobs.max_concurrent_jobs == 0 {
            anyhow::bail!("jobs.max_concurrent_jobs must be > 0");
        }
        if self.jobs.fetch_timeout_secs == 0 {
            anyhow::bail!("jobs.fetch_timeout_secs must be > 0");
        }
        if self.jobs.notification_buffer == 0 {
            anyhow::bail!("jobs.notification_buffer must be > 0");
        }
        if self.jobs.max_retained_jobs == 0 {
            anyhow::bail!("jobs.max_retained_jobs must be > 0");
        }

        if self.analysis.transaction_limit == 0 {
            anyhow::bail!("analysis.transaction_limit must be > 0");
        }
        if self.analysis.wallet_count == 0 {
            anyhow::bail!("analysis.wallet_count must be > 0");
        }
        if self.analysis.max_credits_per_analysis == 0 {
            anyhow::bail!("analysis.max_credits_per_analysis must be > 0");
        }
        if self.analysis.sol_price_usd <= 0.0 {
            anyhow::bail!("analysis.sol_price_usd must be > 0");
        }
        if self.analysis.min_usd_filter < 0.0 {
            anyhow::bail!("analysis.min_usd_filter must be ≥ 0");
        }

        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be > 0");
        }
        if self.rpc.api_key.trim().is_empty() {
            if require_api_key {
                anyhow::bail!("{} is not set and rpc.api_key is empty", API_KEY_ENV);
            }
            warn!("⚠️  No RPC API key configured");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate(false).is_ok());
        assert_eq!(config.analysis.min_usd_filter, 50.0);
        assert_eq!(config.analysis.sol_price_usd, 200.0);
        assert_eq!(config.analysis.dust_floor_lamports, 100_000);
        assert_eq!(config.analysis.wallet_count, DEFAULT_WALLET_LIMIT);
    }

    #[test]
    fn test_api_key_required_by_binary() {
        let mut config = Config::default();
        assert!(config.validate(true).is_err());

        config.apply_env_overrides(Some("  secret ".to_string()));
        assert_eq!(config.rpc.api_key, "secret");
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_blank_env_key_does_not_override() {
        let mut config = Config::default();
        config.rpc.api_key = "from-file".to_string();
        config.apply_env_overrides(Some("   ".to_string()));
        assert_eq!(config.rpc.api_key, "from-file");
        config.apply_env_overrides(None);
        assert_eq!(config.rpc.api_key, "from-file");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [jobs]
            max_concurrent_jobs = 8

            [analysis]
            min_usd_filter = 100.0
            "#,
        )
        .unwrap();

        assert_eq!(config.jobs.max_concurrent_jobs, 8);
        assert_eq!(config.jobs.fetch_timeout_secs, 30);
        assert_eq!(config.analysis.min_usd_filter, 100.0);
        assert_eq!(config.analysis.transaction_limit, 500);
        assert_eq!(config.server.port, 5003);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.jobs.max_concurrent_jobs = 0;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.analysis.transaction_limit = 0;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.analysis.sol_price_usd = 0.0;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.analysis.max_credits_per_analysis = 0;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.jobs.max_retained_jobs = 0;
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let contents = include_str!("../config.example.toml");
        let config = Config::from_toml(contents).unwrap();
        assert!(config.validate(false).is_ok());
    }
}
