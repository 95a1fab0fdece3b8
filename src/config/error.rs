use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating or loading the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No base directory could be derived from the environment
    #[error("cannot locate base directory: neither {variable} nor HOME is set")]
    NoHome {
        /// The XDG variable that was consulted first
        variable: &'static str,
    },

    /// The settings file exists but could not be read
    #[error("I/O error on '{path}': {details}")]
    Io {
        /// Path of the settings file
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// The settings file is not valid TOML or has invalid values
    #[error("failed to parse TOML at '{path}': {details}")]
    TomlParse {
        /// Path of the settings file
        path: PathBuf,
        /// Parse error details
        details: String,
    },
}
