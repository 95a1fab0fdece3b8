//! Settings and directory layout.
//!
//! Settings are read from an optional TOML file; every directory follows the
//! XDG Base Directory specification.

mod error;
mod paths;
mod settings;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use paths::RelayPaths;
pub use settings::{LogLevel, Settings};
