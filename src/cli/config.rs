//! Simulator configuration.
//!
//! A deployment is described by a JSON file (protocol parameters, component
//! addresses and the opening price). Environment variables prefixed with
//! `FLASHLIQ_` override individual fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::{Deployment, ProtocolParams};
use crate::utils::constants::DEFAULT_PRICE_DECIMALS;

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATOR CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Protocol parameters
    pub params: ProtocolParams,
    /// Component addresses
    pub deployment: Deployment,
    /// Price published at deployment, in `params.price_decimals`
    pub initial_price: i128,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // 1 borrowable unit = 1/2000 collateral unit
        let one = 10i128.pow(DEFAULT_PRICE_DECIMALS as u32);
        Self {
            params: ProtocolParams::default(),
            deployment: Deployment::default(),
            initial_price: one / 2000,
        }
    }
}

impl SimulatorConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Load `path` if given (defaults otherwise), then apply environment overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `FLASHLIQ_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FLASHLIQ_LTV_BPS") {
            self.params.ltv_bps = parse_var("FLASHLIQ_LTV_BPS", &v)?;
        }
        if let Some(v) = lookup("FLASHLIQ_BORROW_DECIMALS") {
            self.params.borrow_decimals = parse_var("FLASHLIQ_BORROW_DECIMALS", &v)?;
        }
        if let Some(v) = lookup("FLASHLIQ_COLLATERAL_DECIMALS") {
            self.params.collateral_decimals = parse_var("FLASHLIQ_COLLATERAL_DECIMALS", &v)?;
        }
        if let Some(v) = lookup("FLASHLIQ_PRICE_DECIMALS") {
            self.params.price_decimals = parse_var("FLASHLIQ_PRICE_DECIMALS", &v)?;
        }
        if let Some(v) = lookup("FLASHLIQ_INITIAL_PRICE") {
            self.initial_price = parse_var("FLASHLIQ_INITIAL_PRICE", &v)?;
        }
        Ok(self)
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("flashliq.json")
    }

    /// Config file to read: `explicit` if given, else the default file in
    /// `dir` when one exists
    pub fn locate(explicit: Option<&Path>, dir: &Path) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(dir.join(Self::default_path())).filter(|path| path.is_file()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.deployment
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if self.initial_price < 0 {
            return Err(ConfigError::Validation("initial price cannot be negative".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{} has invalid value {:?}", key, value)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}
