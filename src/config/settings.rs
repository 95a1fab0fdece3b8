use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ConfigError, RelayPaths};

/// Logging verbosity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages, warnings and errors.
    #[default]
    Info,
    /// Debug output for troubleshooting.
    Debug,
    /// Everything, including per-event tracing.
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(level)
    }
}

/// User settings read from `config.toml`.
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding the category files. Defaults to the XDG data directory.
    pub data_root: Option<PathBuf>,

    /// Verbosity used when `RUST_LOG` is not set.
    pub log_level: LogLevel,

    /// Whether external edits to the data files are picked up automatically.
    pub watch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: None,
            log_level: LogLevel::default(),
            watch: true,
        }
    }
}

impl Settings {
    /// Loads the settings file at the standard location.
    ///
    /// # Errors
    /// Returns error if the location cannot be determined or the file is invalid.
    pub fn load(paths: &RelayPaths) -> Result<Self, ConfigError> {
        Self::load_from(&paths.config_file())
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    /// * `ConfigError::Io` - If the file exists but cannot be read
    /// * `ConfigError::TomlParse` - If the content is not valid settings TOML
    #[instrument]
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                });
            }
        };

        toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// The data root to open: the configured one, else the XDG default.
    pub fn data_root(&self, paths: &RelayPaths) -> PathBuf {
        self.data_root
            .clone()
            .unwrap_or_else(|| paths.data_dir.clone())
    }
}
