//! Updatefile parser - the declarative task definitions of an updater
//!
//! ```yaml
//! name: updater-license
//! options:
//!   year: 2024
//! tasks:
//!   default:
//!     description: Add a LICENSE file
//!     depends_on: [clean]
//!     copy:
//!       - src: templates/LICENSE
//!         dest: .
//!     command: git add LICENSE
//! ```

use super::copy;
use super::executor::run_command;
use super::task::{Task, TaskContext, TaskFn, TaskFuture};
use crate::app::Application;
use crate::error::UpdateError;
use crate::multi::Multi;
use crate::registry::UpdaterFactory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Parsed `updatefile.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFile {
    /// Full package-style name (`updater-foo`)
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDef {
    pub description: Option<String>,
    #[serde(default, alias = "deps")]
    pub depends_on: Vec<String>,
    pub command: Option<String>,
    #[serde(default)]
    pub copy: Vec<CopyStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyStep {
    /// Glob relative to the updater directory
    pub src: String,
    /// Directory relative to the invocation cwd
    #[serde(default = "default_dest")]
    pub dest: String,
}

fn default_dest() -> String {
    ".".to_string()
}

impl UpdateFile {
    /// Load from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, UpdateError> {
        let content = std::fs::read_to_string(path).map_err(|e| UpdateError::io(path, e))?;
        Self::parse(&content).map_err(|source| UpdateError::InvalidUpdatefile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

impl TaskDef {
    fn body(&self) -> Option<TaskFn> {
        if self.command.is_none() && self.copy.is_empty() {
            return None;
        }

        let command = self.command.clone();
        let steps = Arc::new(self.copy.clone());
        let run: TaskFn = Arc::new(move |ctx: TaskContext| -> TaskFuture {
            let command = command.clone();
            let steps = steps.clone();
            Box::pin(async move {
                for step in steps.iter() {
                    let dest = ctx.cwd.join(&step.dest);
                    let copied = copy::copy(&step.src, &ctx.path, &dest)?;
                    log::info!("{}: copied {} file(s) to {}", ctx.task, copied.len(), dest.display());
                }

                if let Some(command) = command {
                    let env = [
                        ("UPDATER_NAME", ctx.updater.clone()),
                        ("UPDATER_PATH", ctx.path.display().to_string()),
                        ("UPDATER_TEMPLATES", ctx.templates().display().to_string()),
                    ];
                    run_command(&command, &ctx.cwd, &env).await?;
                }
                Ok::<(), anyhow::Error>(())
            })
        });
        Some(run)
    }
}

impl UpdaterFactory for UpdateFile {
    fn define(&self, app: &mut Application, _base: &Application, _multi: &Multi) -> anyhow::Result<()> {
        for (key, value) in &self.options {
            app.set_option(key, value.clone());
        }

        for (name, def) in &self.tasks {
            let mut task = Task::new(name.clone(), def.depends_on.clone(), def.body());
            if let Some(description) = &def.description {
                task = task.with_description(description.clone());
            }
            app.add_task(task);
        }

        log::debug!("Defined {} task(s) on {}", self.tasks.len(), app.name());
        Ok(())
    }
}
