//! Configuration management for clamcore.

use crate::core::error::{Error, Result};
use crate::core::types::BackendMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine invocation settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Quarantine settings
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Scan history settings
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, or create default if not exists.
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                }
            }
        }

        let config = Self::default();

        if let Err(e) = config.save(&config_path) {
            log::warn!("Failed to save default config: {}", e);
        }

        config
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(Self::data_dir)
            .join("clamcore")
            .join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("clamcore")
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if !(10..=1000).contains(&self.engine.poll_interval_ms) {
            return Err(Error::ConfigInvalid {
                field: "engine.poll_interval_ms".to_string(),
                message: "Must be between 10 and 1000".to_string(),
            });
        }

        if self.engine.terminate_grace_secs == 0 {
            return Err(Error::ConfigInvalid {
                field: "engine.terminate_grace_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.engine.kill_wait_secs == 0 {
            return Err(Error::ConfigInvalid {
                field: "engine.kill_wait_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Engine invocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which backend the coordinator uses
    pub backend: BackendMode,
    /// Explicit path to clamscan (otherwise looked up on PATH)
    pub clamscan_path: Option<PathBuf>,
    /// Explicit path to clamdscan (otherwise looked up on PATH)
    pub clamdscan_path: Option<PathBuf>,
    /// Interval between cancellation checks while the engine runs
    pub poll_interval_ms: u64,
    /// Time the engine gets to exit after SIGTERM
    pub terminate_grace_secs: u64,
    /// Time allowed for reaping after a force kill
    pub kill_wait_secs: u64,
    /// Attempts passed to `clamdscan --ping`
    pub daemon_ping_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendMode::Auto,
            clamscan_path: None,
            clamdscan_path: None,
            poll_interval_ms: 100,
            terminate_grace_secs: 5,
            kill_wait_secs: 2,
            daemon_ping_attempts: 1,
        }
    }
}

impl EngineConfig {
    /// Program used for standalone scans.
    pub fn clamscan(&self) -> PathBuf {
        self.clamscan_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("clamscan"))
    }

    /// Program used for daemon scans.
    pub fn clamdscan(&self) -> PathBuf {
        self.clamdscan_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("clamdscan"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_secs(self.terminate_grace_secs)
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_secs(self.kill_wait_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log file, in addition to the console
    pub log_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_path: None,
        }
    }
}

/// Quarantine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarantineConfig {
    /// Quarantine directory
    pub directory: Option<PathBuf>,
}

impl QuarantineConfig {
    /// Get the effective quarantine directory.
    pub fn quarantine_dir(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("quarantine"))
    }
}

/// Scan history configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Directory holding one JSON file per scan log entry
    pub directory: Option<PathBuf>,
}

impl HistoryConfig {
    /// Get the effective history directory.
    pub fn history_dir(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("logs"))
    }
}
