//! Persistent key/value store - one JSON file per namespace
//!
//! Every mutating call rewrites the file synchronously, so `data` and the
//! file on disk never diverge. Writers in other processes are not guarded.

use crate::dotted;
use crate::error::UpdateError;
use crate::events::{Event, EventBus};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Store handle shared between the orchestrator and running tasks
pub type SharedStore = Arc<Mutex<Store>>;

type Result<T> = std::result::Result<T, UpdateError>;

/// Where and how a store file is written
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Directory holding `<name>.json`
    pub cwd: PathBuf,
    /// Spaces per indent level; 0 writes compact JSON
    pub indent: usize,
}

impl StoreOptions {
    /// Get the default store directory
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".update")
            .join("store")
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cwd: Self::default_dir(),
            indent: 2,
        }
    }
}

/// What a call to [`Store::delete`] removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delete {
    Key(String),
    Keys(Vec<String>),
    /// Every key; refused unless `force` is set
    All { force: bool },
}

impl From<&str> for Delete {
    fn from(key: &str) -> Self {
        Delete::Key(key.to_string())
    }
}

impl From<Vec<&str>> for Delete {
    fn from(keys: Vec<&str>) -> Self {
        Delete::Keys(keys.into_iter().map(String::from).collect())
    }
}

/// A namespaced, disk-backed map from dotted paths to JSON values
#[derive(Debug)]
pub struct Store {
    name: String,
    path: PathBuf,
    indent: usize,
    data: Map<String, Value>,
    bus: Option<EventBus>,
}

impl Store {
    /// Open the store `name`, loading `<cwd>/<name>.json` if it exists
    pub fn open(name: &str, options: &StoreOptions) -> Result<Self> {
        let path = options.cwd.join(format!("{}.json", name));
        let data = Self::load(&path)?;
        log::debug!("Opened store {} at {}", name, path.display());

        Ok(Self {
            name: name.to_string(),
            path,
            indent: options.indent,
            data,
            bus: None,
        })
    }

    fn load(path: &Path) -> Result<Map<String, Value>> {
        if !path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(path).map_err(|e| UpdateError::io(path, e))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        let value: Value =
            serde_json::from_str(&content).map_err(|source| UpdateError::MalformedStore {
                path: path.to_path_buf(),
                source,
            })?;

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(UpdateError::StoreNotObject(path.to_path_buf())),
        }
    }

    /// Publish change notifications on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Wrap into a [`SharedStore`]
    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.emit(event);
        }
    }

    /// Write the in-memory data to disk
    pub fn save(&self) -> Result<()> {
        self.write(&self.data)
    }

    fn write(&self, data: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| UpdateError::io(parent, e))?;
        }

        let content = if self.indent == 0 {
            serde_json::to_vec(data)
        } else {
            let indent = " ".repeat(self.indent);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut buf = Vec::new();
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
            data.serialize(&mut ser).map(|_| buf)
        }
        .map_err(|e| UpdateError::io(&self.path, e.into()))?;

        fs::write(&self.path, content).map_err(|e| UpdateError::io(&self.path, e))
    }

    /// Apply `change` to a copy of the data and keep it only once written
    fn commit<T>(&mut self, change: impl FnOnce(&mut Map<String, Value>) -> T) -> Result<T> {
        let mut next = self.data.clone();
        let out = change(&mut next);
        self.write(&next)?;
        self.data = next;
        Ok(out)
    }

    /// Set `key` (dotted) to `value`
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.commit(|data| dotted::set(data, key, value.clone()))?;
        self.emit(Event::StoreSet {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    /// Set every top-level key of `values`; one notification per key
    pub fn set_all(&mut self, values: Map<String, Value>) -> Result<()> {
        self.commit(|data| {
            for (key, value) in &values {
                dotted::set(data, key, value.clone());
            }
        })?;

        for (key, value) in values {
            self.emit(Event::StoreSet { key, value });
        }
        Ok(())
    }

    /// Value at `key`, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        let value = dotted::get(&self.data, key);
        self.emit(Event::StoreGet {
            key: key.to_string(),
            value: value.cloned(),
        });
        value
    }

    /// True if `key` holds a value other than `null`
    pub fn has(&self, key: &str) -> bool {
        let present = dotted::get(&self.data, key).is_some_and(|v| !v.is_null());
        self.emit(Event::StoreHas {
            key: key.to_string(),
            present,
        });
        present
    }

    /// True if `key` exists, even when its value is `null`
    pub fn has_own(&self, key: &str) -> bool {
        dotted::has_own(&self.data, key)
    }

    /// Append `value` (or each element of an array) to the array at `key`,
    /// skipping elements already present. A scalar already at `key` becomes
    /// the first element.
    pub fn union(&mut self, key: &str, value: Value) -> Result<()> {
        let incoming = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        let value = self.commit(|data| {
            let mut items = match dotted::get(data, key).cloned() {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
            };
            for item in incoming {
                if !items.contains(&item) {
                    items.push(item);
                }
            }

            let value = Value::Array(items);
            dotted::set(data, key, value.clone());
            value
        })?;

        self.emit(Event::StoreSet {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    /// Delete one key, several keys, or (with `force`) everything
    pub fn delete(&mut self, target: impl Into<Delete>) -> Result<()> {
        let target = target.into();
        let keys = match &target {
            Delete::All { force: false } => return Err(UpdateError::ForceRequired),
            Delete::Keys(keys) if keys.is_empty() => return Err(UpdateError::ForceRequired),
            Delete::All { force: true } => self.data.keys().cloned().collect(),
            Delete::Key(key) => vec![key.clone()],
            Delete::Keys(keys) => keys.clone(),
        };

        self.commit(|data| match target {
            Delete::All { .. } => data.clear(),
            _ => {
                for key in &keys {
                    dotted::remove(data, key);
                }
            }
        })?;

        for key in keys {
            self.emit(Event::StoreDel { key });
        }
        Ok(())
    }

    /// Remove a single key
    pub fn omit(&mut self, key: &str) -> Result<()> {
        self.delete(Delete::Key(key.to_string()))
    }
}
