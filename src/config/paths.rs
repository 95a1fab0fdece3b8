use std::{env, path::PathBuf};

use super::ConfigError;

const APP_DIR: &str = "relay";

/// Locations of Relay's configuration, data and logs.
///
/// Follows the XDG Base Directory specification:
/// - configuration under `$XDG_CONFIG_HOME/relay`, else `$HOME/.config/relay`
/// - data under `$XDG_DATA_HOME/relay`, else `$HOME/.local/share/relay`
/// - logs under `<data dir>/logs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPaths {
    /// Directory holding `config.toml`.
    pub config_dir: PathBuf,
    /// Default data root for the category files.
    pub data_dir: PathBuf,
}

impl RelayPaths {
    /// Resolves the directories from the process environment.
    ///
    /// # Errors
    /// * `ConfigError::NoHome` - If neither the XDG variable nor `HOME` is set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolves the directories through `lookup` instead of the real environment.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// * `ConfigError::NoHome` - If neither the XDG variable nor `HOME` is set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let home = var("HOME").map(PathBuf::from);

        let base = |xdg: &'static str, fallback: &[&str]| {
            var(xdg)
                .map(PathBuf::from)
                .or_else(|| home.as_ref().map(|home| home.join(fallback.iter().collect::<PathBuf>())))
                .map(|dir| dir.join(APP_DIR))
                .ok_or(ConfigError::NoHome { variable: xdg })
        };

        Ok(Self {
            config_dir: base("XDG_CONFIG_HOME", &[".config"])?,
            data_dir: base("XDG_DATA_HOME", &[".local", "share"])?,
        })
    }

    /// The main configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory for rotated log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
