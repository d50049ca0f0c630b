use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lifecycle::ledger::DEFAULT_PAGE_SIZE;

pub const CONFIG_FILE: &str = "delivery-lifecycle.toml";
pub const ENV_PREFIX: &str = "DELIVERY_LIFECYCLE";

/// Configuration of the delivery lifecycle engine and its CLI
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub observability: ObservabilityConfig,
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// EnvFilter directive, e.g. `info` or `delivery_lifecycle=debug`
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot used by the CLI
    pub snapshot_path: PathBuf,
    /// SQLite URL, only used with the `database` feature
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Entries fetched per store round-trip when walking a history
    pub history_page_size: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(".delivery-lifecycle/deliveries.json"),
            database_url: None,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            history_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl LifecycleConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. `delivery-lifecycle.toml` in the working directory
    /// 3. Environment variables (`DELIVERY_LIFECYCLE_STORE__SNAPSHOT_PATH`, ...)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Same as [`load`](Self::load) with an explicit file, which may be absent
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        let mut loaded: LifecycleConfig = config.try_deserialize()?;
        loaded.ledger.history_page_size = loaded.ledger.history_page_size.max(1);
        Ok(loaded)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<LifecycleConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = LifecycleConfig::load_env_file();
        LifecycleConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static LifecycleConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
