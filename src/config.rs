//! Configuration - `~/.update/config.yml` plus command line overrides

use crate::dotted;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Root commands recognized when the config file names none
pub const DEFAULT_COMMANDS: [&str; 3] = ["init", "list", "store"];

/// Glob matched against updater directory names
pub const DEFAULT_PATTERN: &str = "updater-*";

fn update_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".update")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for updaters
    pub updaters_dir: PathBuf,
    pub pattern: String,
    /// Files shared by every updater
    pub templates_dir: PathBuf,
    /// Store namespace; the file is `<store_dir>/<store_name>.json`
    pub store_name: String,
    pub store_dir: PathBuf,
    /// JSON indentation of the store file, 0 for compact
    pub indent: usize,
    pub commands: Vec<String>,
    pub verbose: bool,
    /// Options of the root application
    pub options: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            updaters_dir: update_home().join("updaters"),
            pattern: DEFAULT_PATTERN.to_string(),
            templates_dir: update_home().join("templates"),
            store_name: "update".to_string(),
            store_dir: update_home().join("store"),
            indent: 2,
            commands: DEFAULT_COMMANDS.iter().map(|c| c.to_string()).collect(),
            verbose: false,
            options: Map::new(),
        }
    }
}

impl Config {
    /// Get the default config path
    pub fn default_path() -> PathBuf {
        update_home().join("config.yml")
    }

    /// Load from a YAML file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Apply `key=value` option flags to the root options
    pub fn apply_options<S: AsRef<str>>(&mut self, flags: &[S]) {
        for flag in flags {
            let (key, value) = parse_option(flag.as_ref());
            dotted::set(&mut self.options, &key, value);
        }
    }
}

/// Split a `key=value` flag; a bare key is `true`
pub fn parse_option(flag: &str) -> (String, Value) {
    match flag.split_once('=') {
        Some((key, raw)) => (key.trim().to_string(), dotted::parse_value(raw)),
        None => (flag.trim().to_string(), Value::Bool(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.commands, vec!["init", "list", "store"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "pattern: gen-*\nindent: 0\noptions:\n  author:\n    name: Jon\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pattern, "gen-*");
        assert_eq!(config.indent, 0);
        assert_eq!(config.store_name, "update");
        assert_eq!(config.options["author"], json!({"name": "Jon"}));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "indent: [1, 2").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_apply_options() {
        let mut config = Config::default();
        config.apply_options(&["author.name=Jon", "year=2024", "dry"]);

        assert_eq!(
            Value::Object(config.options),
            json!({"author": {"name": "Jon"}, "year": 2024, "dry": true})
        );
    }
}
