//! File views - template files addressable by name
//!
//! Names are matched with a leading `_` or `$` marker stripped, so
//! `_gitignore`, `$gitignore` and `gitignore` are the same view. A resolved
//! view renders a leading `_` as `.`.

use crate::error::UpdateError;
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A single template file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Lookup key (marker stripped)
    pub key: String,
    /// Absolute location of the source file
    pub path: PathBuf,
    /// File name to write the view as
    pub basename: String,
}

impl View {
    pub fn read(&self) -> std::io::Result<String> {
        fs::read_to_string(&self.path)
    }
}

/// Every file below `root`, depth first in file name order.
///
/// Symlinked directories are not descended into; ignore files are not
/// consulted.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>, UpdateError> {
    let mut walker = WalkBuilder::new(root);
    walker
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut files = Vec::new();
    for entry in walker.build() {
        let entry = entry.map_err(|source| UpdateError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        if !is_dir && entry.path().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Strip one leading `_` or `$` marker
pub fn view_key(name: &str) -> &str {
    name.strip_prefix('_')
        .or_else(|| name.strip_prefix('$'))
        .unwrap_or(name)
}

/// Destination name for a template file (`_foo` -> `.foo`)
pub fn dest_basename(name: &str) -> String {
    match name.strip_prefix('_') {
        Some(rest) => format!(".{}", rest),
        None => name.to_string(),
    }
}

/// A collection of views keyed by base name
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    views: BTreeMap<String, View>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every file below `dir`; a missing directory is an empty set
    pub fn load_dir(dir: &Path) -> Result<Self, UpdateError> {
        let mut set = Self::new();
        if dir.is_dir() {
            for path in walk_files(dir)? {
                set.add(path);
            }
        }
        Ok(set)
    }

    /// Add one file, replacing any view with the same key
    pub fn add(&mut self, path: PathBuf) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("Skipping non UTF-8 file name {}", path.display());
            return;
        };
        let key = view_key(name).to_string();
        let view = View {
            key: key.clone(),
            basename: name.to_string(),
            path,
        };
        self.views.insert(key, view);
    }

    pub fn get_view(&self, name: &str) -> Option<&View> {
        self.views.get(view_key(name))
    }

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Resolves a view from a primary set, falling back to a second set
#[derive(Debug, Clone, Default)]
pub struct ViewResolver {
    primary: Arc<FileSet>,
    fallback: Option<Arc<FileSet>>,
}

impl ViewResolver {
    pub fn new(primary: Arc<FileSet>, fallback: Option<Arc<FileSet>>) -> Self {
        Self { primary, fallback }
    }

    pub fn set_fallback(&mut self, fallback: Arc<FileSet>) {
        self.fallback = Some(fallback);
    }

    pub fn get_file(&self, name: &str) -> Option<View> {
        let view = self
            .primary
            .get_view(name)
            .or_else(|| self.fallback.as_ref()?.get_view(name))?;

        let mut view = view.clone();
        view.basename = dest_basename(&view.basename);
        Some(view)
    }
}
