//! Configuration file support for sptorchd
//!
//! Loads and validates sptorchd configuration from TOML files.
//! Default location: /etc/sonic/sptorchd.conf

use crate::blocking::{LoopPreventerConfig, DEFAULT_DROP_RULE_PRIORITY};
use crate::error::{Result, SptError};
use crate::topology::DEFAULT_MAX_SWITCHES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/sptorchd.conf";

/// Topology store limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Maximum number of switches tracked at once
    #[serde(default = "default_max_switches")]
    pub max_switches: usize,
}

/// Drop-rule reconciliation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Flow priority of installed drop rules
    #[serde(default = "default_drop_rule_priority")]
    pub drop_rule_priority: u16,

    /// Keep the peer side of tree edges open on non-root switches
    #[serde(default)]
    pub open_tree_downlinks: bool,

    /// Interval between reconciliation passes that retry unacknowledged actions
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

/// Complete sptorchd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SptConfig {
    #[serde(default)]
    pub topology: TopologyConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_switches() -> usize {
    DEFAULT_MAX_SWITCHES
}

fn default_drop_rule_priority() -> u16 {
    DEFAULT_DROP_RULE_PRIORITY
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            max_switches: default_max_switches(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            drop_rule_priority: default_drop_rule_priority(),
            open_tree_downlinks: false,
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl SptConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    SptError::Config(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "sptorchd: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(SptError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile.retry_interval_ms)
    }

    /// LoopPreventer settings carried by this configuration.
    pub fn preventer_config(&self) -> LoopPreventerConfig {
        LoopPreventerConfig {
            drop_rule_priority: self.reconcile.drop_rule_priority,
            open_tree_downlinks: self.reconcile.open_tree_downlinks,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.topology.max_switches == 0 {
            return Err(SptError::Config("max_switches must be > 0".to_string()));
        }

        if self.reconcile.retry_interval_ms == 0 {
            return Err(SptError::Config(
                "retry_interval_ms must be > 0".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(SptError::Config("logging level must not be empty".to_string()));
        }

        Ok(())
    }
}
