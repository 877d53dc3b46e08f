//! Updater registry - discovers updater directories and how to build them

use crate::app::Application;
use crate::core::UpdateFile;
use crate::error::UpdateError;
use crate::multi::Multi;
use globset::Glob;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Task definitions every updater directory must contain
pub const ENTRY_FILE: &str = "updatefile.yml";

/// Development checkout that is never treated as an updater
pub const RESERVED_DIR: &str = "update-next";

/// Local configuration that overrides the shared base options
pub const LOCAL_CONFIG: &str = ".update/config.yml";

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\W_]+").unwrap());

/// Declares an updater's tasks and options.
///
/// Called once per registration with the new updater, the root application
/// and the orchestrator registering it.
pub trait UpdaterFactory {
    fn define(&self, app: &mut Application, base: &Application, multi: &Multi) -> anyhow::Result<()>;
}

impl<F> UpdaterFactory for F
where
    F: Fn(&mut Application, &Application, &Multi) -> anyhow::Result<()>,
{
    fn define(&self, app: &mut Application, base: &Application, multi: &Multi) -> anyhow::Result<()> {
        self(app, base, multi)
    }
}

/// Where an updater's options come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Constructor {
    /// The root application's options
    #[default]
    Default,
    /// The updater's own `.update/config.yml`
    Local { config: PathBuf },
}

/// Maps a full updater name to its short name
pub type RenameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Options for [`discover`]
#[derive(Clone, Default)]
pub struct RegisterOptions {
    /// Directory scanned for updaters
    pub cwd: PathBuf,
    /// Overrides [`short_name`]
    pub rename: Option<RenameFn>,
}

impl RegisterOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            rename: None,
        }
    }

    fn name_for(&self, fullname: &str) -> String {
        match &self.rename {
            Some(rename) => rename(fullname),
            None => short_name(fullname),
        }
    }
}

/// Identity of an updater being registered
#[derive(Debug, Clone, Default)]
pub struct UpdaterSpec {
    pub fullname: Option<String>,
    pub path: Option<PathBuf>,
    pub constructor: Constructor,
}

/// A discovered updater directory
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub fullname: String,
    pub path: PathBuf,
    pub constructor: Constructor,
    pub updatefile: UpdateFile,
}

impl Candidate {
    pub fn spec(&self) -> UpdaterSpec {
        UpdaterSpec {
            fullname: Some(self.fullname.clone()),
            path: Some(self.path.clone()),
            constructor: self.constructor.clone(),
        }
    }
}

/// Short name of an updater: the last segment of its full name
/// (`updater-foo` -> `foo`, `my_updater.bar` -> `bar`)
pub fn short_name(fullname: &str) -> String {
    SEPARATORS
        .split(fullname)
        .filter(|seg| !seg.is_empty())
        .last()
        .unwrap_or(fullname)
        .to_string()
}

/// Subdirectories of `cwd` whose name or path matches `pattern`, sorted by name
pub fn match_dirs(pattern: &str, cwd: &Path) -> Result<Vec<PathBuf>, UpdateError> {
    let matcher = Glob::new(pattern)
        .map_err(|source| UpdateError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?
        .compile_matcher();

    let mut dirs = Vec::new();
    for entry in fs::read_dir(cwd).map_err(|e| UpdateError::io(cwd, e))? {
        let entry = entry.map_err(|e| UpdateError::io(cwd, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if name == RESERVED_DIR || !path.is_dir() {
            continue;
        }
        if matcher.is_match(name) {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// Choose the constructor for an updater directory
pub fn resolve_constructor(dir: &Path) -> Constructor {
    let config = dir.join(LOCAL_CONFIG);
    if config.is_file() {
        Constructor::Local { config }
    } else {
        Constructor::Default
    }
}

/// Load one updater directory
pub fn load_candidate(dir: &Path, options: &RegisterOptions) -> Result<Candidate, UpdateError> {
    let entry = dir.join(ENTRY_FILE);
    if !entry.is_file() {
        return Err(UpdateError::MissingEntry(dir.to_path_buf()));
    }

    let updatefile = UpdateFile::from_file(&entry)?;
    let fullname = match &updatefile.name {
        Some(name) => name.clone(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    Ok(Candidate {
        name: options.name_for(&fullname),
        fullname,
        path: dir.to_path_buf(),
        constructor: resolve_constructor(dir),
        updatefile,
    })
}

/// Discover every updater under `options.cwd` matching `pattern`.
///
/// A matching directory without a valid updatefile fails discovery.
pub fn discover(pattern: &str, options: &RegisterOptions) -> Result<Vec<Candidate>, UpdateError> {
    if !options.cwd.is_dir() {
        log::debug!("Updater directory {} does not exist", options.cwd.display());
        return Ok(Vec::new());
    }

    let candidates = match_dirs(pattern, &options.cwd)?
        .iter()
        .map(|dir| load_candidate(dir, options))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "Discovered {} updater(s) in {}",
        candidates.len(),
        options.cwd.display()
    );
    Ok(candidates)
}
