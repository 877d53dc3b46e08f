//! Command line arguments

use crate::config::Config;
use crate::dotted;
use crate::store::{Delete, Store};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "update", version, about = "Run updaters and their tasks in series")]
pub struct Args {
    /// Updaters, `updater:task` selections, root commands or base tasks
    pub tokens: Vec<String>,

    /// Log registration and store events
    #[arg(short, long)]
    pub verbose: bool,

    /// Persist `key=value` in the store
    #[arg(long, value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Print whether the store has a value for `key`
    #[arg(long, value_name = "KEY")]
    pub has: Vec<String>,

    /// Remove `key` from the store
    #[arg(long, value_name = "KEY")]
    pub omit: Vec<String>,

    /// Delete every key in the store
    #[arg(long)]
    pub del: bool,

    /// Root application option, `key=value` (dotted keys allowed)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    #[arg(long, env = "UPDATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "UPDATE_UPDATERS_DIR")]
    pub updaters_dir: Option<PathBuf>,

    /// Glob matched against updater directory names
    #[arg(long)]
    pub pattern: Option<String>,

    #[arg(long, env = "UPDATE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Directory tasks run in (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

impl Args {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Override file settings with the flags given
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.updaters_dir {
            config.updaters_dir = dir.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.pattern = pattern.clone();
        }
        if let Some(dir) = &self.store_dir {
            config.store_dir = dir.clone();
        }
        config.verbose |= self.verbose;
        config.apply_options(&self.options);
    }

    pub fn has_store_flags(&self) -> bool {
        self.del || !self.set.is_empty() || !self.has.is_empty() || !self.omit.is_empty()
    }

    /// Apply `--set`, `--has`, `--omit` and `--del` to the store.
    ///
    /// Returns the lines `--has` prints.
    pub fn apply_store_flags(&self, store: &mut Store) -> Result<Vec<String>> {
        for flag in &self.set {
            let Some((key, raw)) = flag.split_once('=') else {
                anyhow::bail!("--set expects key=value, got '{}'", flag);
            };
            store.set(key.trim(), dotted::parse_value(raw))?;
        }

        let answers = self
            .has
            .iter()
            .map(|key| store.has(key).to_string())
            .collect();

        for key in &self.omit {
            store.omit(key)?;
        }
        if self.del {
            store.delete(Delete::All { force: true })?;
        }
        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOptions;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "update", "-v", "foo", "bar:lint", "--set", "a=1", "-o", "x.y=z",
        ])
        .unwrap();
        assert!(args.verbose);
        assert_eq!(args.tokens, vec!["foo", "bar:lint"]);
        assert_eq!(args.set, vec!["a=1"]);
        assert_eq!(args.options, vec!["x.y=z"]);
        assert!(args.has_store_flags());
    }

    #[test]
    fn test_apply_to_overrides_config() {
        let args = Args {
            pattern: Some("gen-*".into()),
            verbose: true,
            options: vec!["name=demo".into()],
            ..Default::default()
        };
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.pattern, "gen-*");
        assert!(config.verbose);
        assert_eq!(config.options["name"], json!("demo"));
    }

    #[test]
    fn test_store_flags() {
        let dir = TempDir::new().unwrap();
        let options = StoreOptions {
            cwd: dir.path().to_path_buf(),
            indent: 2,
        };
        let mut store = Store::open("flags", &options).unwrap();

        let args = Args {
            set: vec!["a.b=2".into(), "c=x".into()],
            has: vec!["a.b".into(), "missing".into()],
            omit: vec!["c".into()],
            ..Default::default()
        };
        let answers = args.apply_store_flags(&mut store).unwrap();

        assert_eq!(answers, vec!["true", "false"]);
        assert_eq!(store.get("a.b"), Some(&json!(2)));
        assert!(!store.has_own("c"));

        let del = Args {
            del: true,
            ..Default::default()
        };
        del.apply_store_flags(&mut store).unwrap();
        assert!(store.data().is_empty());
    }

    #[test]
    fn test_set_requires_key_value() {
        let dir = TempDir::new().unwrap();
        let options = StoreOptions {
            cwd: dir.path().to_path_buf(),
            indent: 2,
        };
        let mut store = Store::open("flags", &options).unwrap();
        let args = Args {
            set: vec!["nope".into()],
            ..Default::default()
        };
        assert!(args.apply_store_flags(&mut store).is_err());
    }
}
