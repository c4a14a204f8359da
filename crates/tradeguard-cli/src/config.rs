//! Application configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tradeguard_core::RiskLimits;
use tradeguard_risk::{BreakerConfig, BreakerOverride, BreakerType};

use crate::error::{AppError, AppResult};

/// Breaker store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Volatile. Every breaker is closed after a restart.
    #[default]
    Memory,
    /// JSON document on disk.
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// State file for `kind = "file"`.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/breakers.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_journal_dir")]
    pub dir: PathBuf,
    /// Records buffered before a write. Default: 1 (write-through).
    #[serde(default = "default_journal_buffer_size")]
    pub buffer_size: usize,
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("data/journal")
}

fn default_journal_buffer_size() -> usize {
    1
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_journal_dir(),
            buffer_size: default_journal_buffer_size(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub limits: RiskLimits,
    /// Per-breaker overrides keyed by type name, e.g. `[breakers.FLASH_CRASH]`.
    #[serde(default)]
    pub breakers: HashMap<String, BreakerOverride>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with the given limits and defaults everywhere else.
    pub fn with_limits(limits: RiskLimits) -> Self {
        Self {
            limits,
            breakers: HashMap::new(),
            store: StoreConfig::default(),
            journal: JournalConfig::default(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        self.limits
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.breaker_config()?;

        if self.store.kind == StoreKind::File && self.store.path.as_os_str().is_empty() {
            return Err(AppError::Config(
                "store.path is required when store.kind = \"file\"".to_string(),
            ));
        }
        if self.journal.enabled && self.journal.dir.as_os_str().is_empty() {
            return Err(AppError::Config(
                "journal.dir is required when journal.enabled = true".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve breaker overrides into per-type settings.
    pub fn breaker_config(&self) -> AppResult<BreakerConfig> {
        let overrides = self
            .breakers
            .iter()
            .map(|(name, ov)| {
                let breaker: BreakerType = name
                    .parse()
                    .map_err(|e| AppError::Config(format!("[breakers.{name}]: {e}")))?;
                Ok((breaker, *ov))
            })
            .collect::<AppResult<HashMap<_, _>>>()?;

        BreakerConfig::from_overrides(&overrides).map_err(|e| AppError::Config(e.to_string()))
    }
}
