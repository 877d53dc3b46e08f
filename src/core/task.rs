//! Task graph - named tasks with declared dependencies

use crate::error::UpdateError;
use crate::store::SharedStore;
use crate::views::ViewResolver;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Body of a task
pub type TaskFn = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// Everything a task body can see about the application running it
#[derive(Clone)]
pub struct TaskContext {
    /// Updater name (`base` for the root application)
    pub updater: String,
    pub task: String,
    /// Directory the updater was loaded from
    pub path: PathBuf,
    /// Directory the command line was invoked in
    pub cwd: PathBuf,
    pub options: Arc<Map<String, Value>>,
    pub store: SharedStore,
    pub files: ViewResolver,
}

impl TaskContext {
    pub fn templates(&self) -> PathBuf {
        self.path.join("templates")
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        crate::dotted::get(&self.options, key)
    }
}

/// A named unit of work
#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub description: Option<String>,
    pub deps: Vec<String>,
    run: Option<TaskFn>,
}

impl Task {
    pub fn new(name: impl Into<String>, deps: Vec<String>, run: Option<TaskFn>) -> Self {
        Self {
            name: name.into(),
            description: None,
            deps,
            run,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Run the body; tasks without one only group their dependencies
    pub async fn run(&self, ctx: TaskContext) -> anyhow::Result<()> {
        match &self.run {
            Some(run) => run(ctx).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("has_body", &self.run.is_some())
            .finish()
    }
}

/// Tasks of one application, in declaration order
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: IndexMap<String, Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task; redefining a name replaces it in place
    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.name.clone(), task);
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Order in which `names` must run: dependencies first, each task once
    pub fn resolve(&self, owner: &str, names: &[String]) -> Result<Vec<String>, UpdateError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut stack = Vec::new();

        for name in names {
            self.visit(owner, name, &mut stack, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        owner: &str,
        name: &str,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), UpdateError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(UpdateError::CircularDependency(cycle));
        }

        let Some(task) = self.tasks.get(name) else {
            return Err(UpdateError::TaskNotFound {
                updater: owner.to_string(),
                task: name.to_string(),
            });
        };

        stack.push(name.to_string());
        for dep in &task.deps {
            self.visit(owner, dep, stack, done, order)?;
        }
        stack.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(spec: &[(&str, &[&str])]) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for (name, deps) in spec {
            let deps = deps.iter().map(|d| d.to_string()).collect();
            graph.insert(Task::new(*name, deps, None));
        }
        graph
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_runs_dependencies_first() {
        let graph = graph(&[
            ("lint", &[]),
            ("build", &["lint"]),
            ("default", &["build", "lint"]),
        ]);

        let order = graph.resolve("base", &names(&["default"])).unwrap();
        assert_eq!(order, names(&["lint", "build", "default"]));
    }

    #[test]
    fn test_resolve_keeps_requested_order() {
        let graph = graph(&[("a", &[]), ("b", &[]), ("c", &["a"])]);

        let order = graph.resolve("base", &names(&["b", "c", "a"])).unwrap();
        assert_eq!(order, names(&["b", "a", "c"]));
    }

    #[test]
    fn test_resolve_unknown_task() {
        let graph = graph(&[("default", &["missing"])]);

        let err = graph.resolve("foo", &names(&["default"])).unwrap_err();
        match err {
            UpdateError::TaskNotFound { updater, task } => {
                assert_eq!(updater, "foo");
                assert_eq!(task, "missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_detects_cycles() {
        let graph = graph(&[("a", &["b"]), ("b", &["a"])]);

        let err = graph.resolve("base", &names(&["a"])).unwrap_err();
        assert!(matches!(err, UpdateError::CircularDependency(ref c) if c == &names(&["a", "b", "a"])));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut graph = graph(&[("a", &[]), ("b", &[])]);
        graph.insert(Task::new("a", names(&["b"]), None));

        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(graph.get("a").unwrap().deps, names(&["b"]));
    }
}
