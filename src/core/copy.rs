//! Copy step - copies template files matching a glob into a destination

use crate::error::{PluginError, UpdateError};
use crate::views::{dest_basename, walk_files};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};

const PLUGIN: &str = "copy";

/// Destination details for one copied file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dest {
    /// Path relative to the glob's literal prefix
    pub relative: PathBuf,
    pub dirname: PathBuf,
    pub extname: String,
    pub basename: String,
    /// Base name without extension
    pub filename: String,
    pub path: PathBuf,
}

impl Dest {
    /// Destination of `relative` inside `dest_dir`, applying the `_` -> `.` rename
    pub fn new(relative: &Path, dest_dir: &Path) -> Self {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let basename = dest_basename(&name);
        let dirname = match relative.parent() {
            Some(parent) => dest_dir.join(parent),
            None => dest_dir.to_path_buf(),
        };
        let extname = Path::new(&basename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let filename = basename
            .strip_suffix(&extname)
            .unwrap_or(&basename)
            .to_string();

        Self {
            relative: relative.to_path_buf(),
            path: dirname.join(&basename),
            dirname,
            extname,
            basename,
            filename,
        }
    }
}

/// Literal directory prefix of a glob (`templates/**/*.txt` -> `templates`)
fn glob_base(pattern: &str) -> PathBuf {
    pattern
        .split('/')
        .take_while(|seg| !seg.contains(['*', '?', '[', '{']))
        .collect::<Vec<_>>()
        .join("/")
        .into()
}

fn matcher(pattern: &str) -> Result<GlobMatcher, UpdateError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|source| UpdateError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Copy every file under `src_root` matching `pattern` into `dest_dir`
pub fn copy(pattern: &str, src_root: &Path, dest_dir: &Path) -> Result<Vec<Dest>, PluginError> {
    let matcher = matcher(pattern).map_err(|e| PluginError::new(PLUGIN, e))?;
    let base = glob_base(pattern);

    // A pattern without glob characters names a single file.
    let (walk_root, prefix) = if src_root.join(&base).is_file() {
        let parent = base.parent().map(Path::to_path_buf).unwrap_or_default();
        (src_root.join(&parent), parent)
    } else {
        (src_root.join(&base), base)
    };

    let files = if walk_root.is_dir() {
        walk_files(&walk_root).map_err(|e| PluginError::new(PLUGIN, e))?
    } else {
        Vec::new()
    };

    let mut copied = Vec::new();
    for file in files {
        let Ok(rel_to_root) = file.strip_prefix(src_root) else {
            continue;
        };
        let candidate = rel_to_root.to_string_lossy().replace('\\', "/");
        if !matcher.is_match(&candidate) {
            continue;
        }

        let relative = rel_to_root.strip_prefix(&prefix).unwrap_or(rel_to_root);
        let dest = Dest::new(relative, dest_dir);

        fs::create_dir_all(&dest.dirname)
            .map_err(|e| PluginError::new(PLUGIN, format!("{}: {}", dest.dirname.display(), e)))?;
        fs::copy(&file, &dest.path)
            .map_err(|e| PluginError::new(PLUGIN, format!("{}: {}", file.display(), e)))?;

        log::debug!("Copied {} -> {}", file.display(), dest.path.display());
        copied.push(dest);
    }

    if copied.is_empty() {
        log::warn!("No files matched {} in {}", pattern, src_root.display());
    }
    Ok(copied)
}
