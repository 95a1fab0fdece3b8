//! Unit tests for settings and directory resolution.
//!
//! Environment lookups are injected, so nothing here touches the real
//! process environment.

#![allow(clippy::unwrap_used)]

use std::{collections::HashMap, fs, path::PathBuf};

use tempfile::TempDir;

use crate::config::{ConfigError, LogLevel, RelayPaths, Settings};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn paths_fall_back_to_home() {
    let paths = RelayPaths::from_lookup(lookup(&[("HOME", "/home/ops")])).unwrap();

    assert_eq!(paths.config_dir, PathBuf::from("/home/ops/.config/relay"));
    assert_eq!(paths.data_dir, PathBuf::from("/home/ops/.local/share/relay"));
    assert_eq!(
        paths.config_file(),
        PathBuf::from("/home/ops/.config/relay/config.toml")
    );
    assert_eq!(
        paths.log_dir(),
        PathBuf::from("/home/ops/.local/share/relay/logs")
    );
}

#[test]
fn xdg_variables_take_precedence() {
    let paths = RelayPaths::from_lookup(lookup(&[
        ("HOME", "/home/ops"),
        ("XDG_CONFIG_HOME", "/etc/xdg"),
        ("XDG_DATA_HOME", "/srv/data"),
    ]))
    .unwrap();

    assert_eq!(paths.config_dir, PathBuf::from("/etc/xdg/relay"));
    assert_eq!(paths.data_dir, PathBuf::from("/srv/data/relay"));
}

#[test]
fn empty_xdg_variable_is_ignored() {
    let paths = RelayPaths::from_lookup(lookup(&[
        ("HOME", "/home/ops"),
        ("XDG_DATA_HOME", ""),
    ]))
    .unwrap();

    assert_eq!(paths.data_dir, PathBuf::from("/home/ops/.local/share/relay"));
}

#[test]
fn no_home_is_an_error() {
    let result = RelayPaths::from_lookup(lookup(&[]));

    assert!(matches!(
        result,
        Err(ConfigError::NoHome {
            variable: "XDG_CONFIG_HOME"
        })
    ));
}

#[test]
fn missing_settings_file_yields_defaults() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();

    assert_eq!(settings, Settings::default());
    assert!(settings.watch);
    assert_eq!(settings.log_level, LogLevel::Info);
}

#[test]
fn settings_file_overrides_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
data_root = "/srv/relay"
log_level = "debug"
watch = false
"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();

    assert_eq!(settings.data_root, Some(PathBuf::from("/srv/relay")));
    assert_eq!(settings.log_level, LogLevel::Debug);
    assert!(!settings.watch);
}

#[test]
fn partial_settings_keep_other_defaults() {
    let settings: Settings = toml::from_str("log_level = \"trace\"").unwrap();

    assert_eq!(settings.log_level, LogLevel::Trace);
    assert!(settings.watch);
    assert_eq!(settings.data_root, None);
}

#[test]
fn invalid_settings_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "log_level = \"loud\"").unwrap();

    let result = Settings::load_from(&path);

    assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
}

#[test]
fn unknown_keys_are_rejected() {
    let result: Result<Settings, _> = toml::from_str("data_dir = \"/tmp\"");

    assert!(result.is_err());
}

#[test]
fn configured_data_root_wins_over_default() {
    let paths = RelayPaths::from_lookup(lookup(&[("HOME", "/home/ops")])).unwrap();

    let default = Settings::default();
    assert_eq!(default.data_root(&paths), paths.data_dir);

    let configured = Settings {
        data_root: Some(PathBuf::from("/srv/relay")),
        ..Settings::default()
    };
    assert_eq!(configured.data_root(&paths), PathBuf::from("/srv/relay"));
}

#[test]
fn log_level_displays_lowercase() {
    assert_eq!(LogLevel::Warn.to_string(), "warn");
    assert_eq!(LogLevel::default().to_string(), "info");
}
