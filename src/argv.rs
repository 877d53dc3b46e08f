//! Command line parser - turns positional tokens into a run request
//!
//! Tokens are classified in this order:
//! 1. a token with a non-word character (`foo:bar`, `a:x,y|b:z`) selects tasks
//!    on updaters explicitly
//! 2. a root command (`init`, `list`, ...)
//! 3. a known updater name, which selects its `default` task
//! 4. the literal `base`, a placeholder for the root application
//! 5. anything else is a task of the root application
//!
//! An updater named like a root command can still be selected as `name:default`.

use crate::app::BASE;
use crate::error::UpdateError;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W").unwrap());

/// Updater name to the tasks requested on it, in first-mention order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSelection {
    entries: IndexMap<String, Vec<String>>,
}

impl TaskSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `tasks` to `updater`, skipping ones already selected
    pub fn union<I, S>(&mut self, updater: &str, tasks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selected = self.entries.entry(updater.to_string()).or_default();
        for task in tasks {
            let task = task.into();
            if !selected.contains(&task) {
                selected.push(task);
            }
        }
    }

    /// Merge another selection into this one
    pub fn extend(&mut self, other: TaskSelection) {
        for (updater, tasks) in other.entries {
            self.union(&updater, tasks);
        }
    }

    pub fn get(&self, updater: &str) -> Option<&[String]> {
        self.entries.get(updater).map(Vec::as_slice)
    }

    pub fn contains(&self, updater: &str) -> bool {
        self.entries.contains_key(updater)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, tasks)| (name.as_str(), tasks.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub commands: Vec<String>,
    pub updaters: TaskSelection,
}

impl RunRequest {
    /// Reject more than one root command
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.commands.len() > 1 {
            return Err(UpdateError::MultipleCommands(self.commands.clone()));
        }
        Ok(())
    }

    pub fn command(&self) -> Option<&str> {
        self.commands.first().map(String::as_str)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c == name)
    }
}

/// Expand a structured token into `(updater, tasks)` pairs.
///
/// Segments are separated by `|`, the updater from its tasks by `:`, tasks
/// by `,`. A segment without tasks selects `default`.
pub fn expand(token: &str) -> Vec<(String, Vec<String>)> {
    token
        .split('|')
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let (name, tasks) = seg.split_once(':').unwrap_or((seg, ""));
            let mut tasks: Vec<String> = tasks
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            if tasks.is_empty() {
                tasks.push("default".to_string());
            }
            (name.trim().to_string(), tasks)
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Parse positional tokens against the root `commands` and the updater names
/// `is_updater` recognizes
pub fn parse<S, F>(tokens: &[S], commands: &[String], is_updater: F) -> Result<RunRequest, UpdateError>
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    let mut request = RunRequest::default();

    for token in tokens {
        let token = token.as_ref();

        if NON_WORD.is_match(token) {
            for (updater, tasks) in expand(token) {
                request.updaters.union(&updater, tasks);
            }
            continue;
        }

        if commands.iter().any(|c| c == token) {
            request.commands.push(token.to_string());
            continue;
        }

        if is_updater(token) {
            if !request.updaters.contains(token) {
                request.updaters.union(token, ["default"]);
            }
        } else if token != BASE {
            request.updaters.union(BASE, [token]);
        }
    }

    request.validate()?;
    log::debug!("Parsed request: {:?}", request);
    Ok(request)
}
