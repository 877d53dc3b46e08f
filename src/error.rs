//! Error types shared across the store, parser, registry and task graph

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Typed failures surfaced to the CLI
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("only one root level command may be given: \"{}\"", .0.join(", "))]
    MultipleCommands(Vec<String>),

    #[error("options.force is required to delete the entire cache.")]
    ForceRequired,

    #[error("task '{task}' is not in your updatefile ({updater})")]
    TaskNotFound { updater: String, task: String },

    #[error("updater '{0}' is not registered")]
    UpdaterNotFound(String),

    #[error("circular task dependency: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("no updatefile.yml found in {0}")]
    MissingEntry(PathBuf),

    #[error("malformed JSON in store {path}: {source}")]
    MalformedStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store {0} does not contain a JSON object")]
    StoreNotObject(PathBuf),

    #[error("invalid updatefile {path}: {source}")]
    InvalidUpdatefile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("command `{command}` exited with code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UpdateError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Error raised by a file-processing stage (copy, dest)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.plugin, self.message)
    }
}

impl std::error::Error for PluginError {}

/// Render a task error for display.
///
/// Plugin errors use their own string form; anything else prints the
/// full cause chain.
pub fn format_error(err: &anyhow::Error) -> String {
    if let Some(plugin) = err.downcast_ref::<PluginError>() {
        return plugin.to_string();
    }
    format!("{:?}", err)
}
