// Application configuration (~/.spatialhome/config.json)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{APP_FOLDER, CONFIG_FILENAME, DEFAULT_LOG_LEVEL, DEFAULT_MOCK_DELAY_MS};
use crate::error::{Result, SpatialHomeError};
use crate::store::default_store_path;

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Placement file; `None` uses ~/.spatialhome/device_placements.json.
    pub store_path: Option<PathBuf>,
    /// Artificial latency of the mock gateway.
    pub mock_delay_ms: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            mock_delay_ms: DEFAULT_MOCK_DELAY_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// A loaded config and the problems found while reading it.
///
/// Entry points read the config before a logger exists, so warnings are
/// returned to the caller instead of being logged here.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLoad {
    pub config: AppConfig,
    pub warnings: Vec<String>,
}

impl ConfigLoad {
    fn defaults(warning: Option<String>) -> Self {
        Self {
            config: AppConfig::default(),
            warnings: warning.into_iter().collect(),
        }
    }

    /// Send every warning to the `log` facade.
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            log::warn!("{}", warning);
        }
    }
}

impl AppConfig {
    /// Load from the default location and log any warnings.
    pub fn load() -> Self {
        let loaded = Self::read();
        loaded.log_warnings();
        loaded.config
    }

    /// Load from `path` and log any warnings.
    pub fn load_from(path: &Path) -> Self {
        let loaded = Self::read_from(path);
        loaded.log_warnings();
        loaded.config
    }

    /// Read from the default location without logging.
    pub fn read() -> ConfigLoad {
        match default_config_path() {
            Some(path) => Self::read_from(&path),
            None => ConfigLoad::defaults(Some(
                "Could not determine home directory, using default config".to_string(),
            )),
        }
    }

    /// Missing file gives defaults. A malformed file gives defaults and a warning.
    pub fn read_from(path: &Path) -> ConfigLoad {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ConfigLoad::defaults(None),
            Err(e) => {
                return ConfigLoad::defaults(Some(format!(
                    "Failed to read config {}: {}, using defaults",
                    path.display(),
                    e
                )));
            }
        };

        let config: AppConfig = match serde_json::from_str(&contents) {
            Ok(c) => c,
            Err(e) => {
                return ConfigLoad::defaults(Some(format!(
                    "Malformed config {}: {}, using defaults",
                    path.display(),
                    e
                )));
            }
        };

        match config.validate() {
            Ok(()) => ConfigLoad {
                config,
                warnings: Vec::new(),
            },
            Err(e) => ConfigLoad {
                config: Self {
                    log_level: DEFAULT_LOG_LEVEL.to_string(),
                    ..config
                },
                warnings: vec![format!("{}, using default log level", e)],
            },
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(SpatialHomeError::Config(format!("Unknown log level '{}'", self.log_level)))
        }
    }

    /// Explicit `store_path`, else the default placement file.
    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path.clone().or_else(default_store_path)
    }
}

/// ~/.spatialhome/config.json
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(APP_FOLDER).join(CONFIG_FILENAME))
}
