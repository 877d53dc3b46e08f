//! Application - the root bundle or one updater: tasks, options and files

use crate::core::{Task, TaskContext, TaskFn, TaskFuture, TaskGraph};
use crate::dotted;
use crate::error::{format_error, UpdateError};
use crate::events::{Event, EventBus};
use crate::store::{SharedStore, Store};
use crate::views::{FileSet, View, ViewResolver};
use anyhow::Result;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Name of the root application
pub const BASE: &str = "base";

/// Collaborators shared by every application of a run
#[derive(Clone)]
pub struct Services {
    pub store: SharedStore,
    pub bus: EventBus,
    /// Directory the command line was invoked in
    pub cwd: PathBuf,
}

impl Services {
    /// Wire `store` to publish on `bus`
    pub fn new(store: Store, bus: EventBus, cwd: PathBuf) -> Self {
        Self {
            store: store.with_events(bus.clone()).shared(),
            bus,
            cwd,
        }
    }
}

/// A named set of tasks plus the options and files they run with
pub struct Application {
    name: String,
    fullname: String,
    path: PathBuf,
    options: Map<String, Value>,
    tasks: TaskGraph,
    /// Own files: shared files for the root, `templates/` for an updater
    files: Arc<FileSet>,
    resolver: ViewResolver,
    services: Services,
}

impl Application {
    /// Create the root application
    pub fn base(services: Services, options: Map<String, Value>, files: FileSet) -> Self {
        let files = Arc::new(files);
        Self {
            name: BASE.to_string(),
            fullname: BASE.to_string(),
            path: services.cwd.clone(),
            options,
            tasks: TaskGraph::new(),
            resolver: ViewResolver::new(files.clone(), None),
            files,
            services,
        }
    }

    /// Create an updater rooted at `path`, resolving files from `base` first
    pub fn updater(
        name: &str,
        fullname: &str,
        path: &Path,
        options: Map<String, Value>,
        base: &Application,
    ) -> Result<Self, UpdateError> {
        let templates = Arc::new(FileSet::load_dir(&path.join("templates"))?);
        Ok(Self {
            name: name.to_string(),
            fullname: fullname.to_string(),
            path: path.to_path_buf(),
            options,
            tasks: TaskGraph::new(),
            resolver: ViewResolver::new(base.files.clone(), Some(templates.clone())),
            files: templates,
            services: base.services.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_base(&self) -> bool {
        self.name == BASE
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        dotted::get(&self.options, key)
    }

    pub fn set_option(&mut self, key: &str, value: Value) -> &mut Self {
        dotted::set(&mut self.options, key, value);
        self
    }

    pub fn tasks(&self) -> &TaskGraph {
        &self.tasks
    }

    pub fn files(&self) -> &Arc<FileSet> {
        &self.files
    }

    pub fn store(&self) -> &SharedStore {
        &self.services.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.services.bus
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Resolve a file view by name (see [`ViewResolver`])
    pub fn get_file(&self, name: &str) -> Option<View> {
        self.resolver.get_file(name)
    }

    pub(crate) fn set_file_fallback(&mut self, files: Arc<FileSet>) {
        self.resolver.set_fallback(files);
    }

    pub fn add_task(&mut self, task: Task) -> &mut Self {
        self.tasks.insert(task);
        self
    }

    /// Register an async task
    pub fn task<F, Fut>(&mut self, name: &str, deps: &[&str], f: F) -> &mut Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let run: TaskFn = Arc::new(move |ctx: TaskContext| -> TaskFuture { Box::pin(f(ctx)) });
        let deps = deps.iter().map(|d| d.to_string()).collect();
        self.add_task(Task::new(name, deps, Some(run)))
    }

    /// Register a task that only runs its dependencies
    pub fn alias(&mut self, name: &str, deps: &[&str]) -> &mut Self {
        let deps = deps.iter().map(|d| d.to_string()).collect();
        self.add_task(Task::new(name, deps, None))
    }

    fn context(&self, task: &str, options: Arc<Map<String, Value>>) -> TaskContext {
        TaskContext {
            updater: self.name.clone(),
            task: task.to_string(),
            path: self.path.clone(),
            cwd: self.services.cwd.clone(),
            options,
            store: self.services.store.clone(),
            files: self.resolver.clone(),
        }
    }

    /// Run `tasks` (or `default`) and their dependencies in series, stopping
    /// at the first failure
    pub async fn build(&self, tasks: &[String]) -> Result<()> {
        let requested = if tasks.is_empty() {
            vec!["default".to_string()]
        } else {
            tasks.to_vec()
        };

        let order = match self.tasks.resolve(&self.name, &requested) {
            Ok(order) => order,
            Err(err) => {
                if let UpdateError::TaskNotFound { updater, task } = &err {
                    self.bus().emit(Event::TaskNotFound {
                        updater: updater.clone(),
                        task: task.clone(),
                    });
                }
                return Err(err.into());
            }
        };

        let options = Arc::new(self.options.clone());
        for name in order {
            let Some(task) = self.tasks.get(&name) else {
                continue;
            };

            self.bus().emit(Event::TaskStart {
                updater: self.name.clone(),
                task: name.clone(),
            });
            let started = Instant::now();

            match task.run(self.context(&name, options.clone())).await {
                Ok(()) => self.bus().emit(Event::TaskStop {
                    updater: self.name.clone(),
                    task: name,
                    duration: started.elapsed(),
                }),
                Err(err) => {
                    self.bus().emit(Event::TaskErr {
                        updater: self.name.clone(),
                        task: name,
                        duration: started.elapsed(),
                        error: format_error(&err),
                    });
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("fullname", &self.fullname)
            .field("path", &self.path)
            .field("tasks", &self.tasks.names().collect::<Vec<_>>())
            .finish()
    }
}
