//! Orchestrator - registers updaters on the root application and runs a
//! parsed request against them in series

use crate::app::{Application, BASE};
use crate::argv::{self, RunRequest};
use crate::config::Config;
use crate::error::UpdateError;
use crate::events::Event;
use crate::prompt::{Choice, Prompt};
use crate::registry::{self, Constructor, RegisterOptions, UpdaterFactory, UpdaterSpec};
use anyhow::Result;
use indexmap::IndexMap;

/// Root command that asks which updaters to run
pub const LIST: &str = "list";

pub struct Multi {
    base: Application,
    updaters: IndexMap<String, Application>,
    commands: Vec<String>,
    prompt: Box<dyn Prompt>,
}

impl Multi {
    pub fn new(base: Application, commands: Vec<String>, prompt: Box<dyn Prompt>) -> Self {
        Self {
            base,
            updaters: IndexMap::new(),
            commands,
            prompt,
        }
    }

    pub fn base(&self) -> &Application {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Application {
        &mut self.base
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Registered updaters in registration order
    pub fn updaters(&self) -> impl Iterator<Item = &Application> {
        self.updaters.values()
    }

    pub fn updater(&self, name: &str) -> Option<&Application> {
        self.updaters.get(name)
    }

    pub fn has_updater(&self, name: &str) -> bool {
        self.updaters.contains_key(name)
    }

    /// Look up an application by name; `base` is the root
    pub fn application(&self, name: &str) -> Option<&Application> {
        if name == BASE {
            Some(&self.base)
        } else {
            self.updaters.get(name)
        }
    }

    /// Register every updater discovered under `options.cwd`
    pub fn register_each(&mut self, pattern: &str, options: &RegisterOptions) -> Result<usize> {
        let candidates = registry::discover(pattern, options)?;
        for candidate in &candidates {
            self.register(&candidate.name, candidate.spec(), &candidate.updatefile)?;
        }

        log::debug!(
            "Registered {} updater(s) from {}",
            candidates.len(),
            options.cwd.display()
        );
        Ok(candidates.len())
    }

    /// Build one updater and store it under `name`.
    ///
    /// A name that is already taken is replaced in place: the newest
    /// registration wins and keeps the original position.
    pub fn register(
        &mut self,
        name: &str,
        spec: UpdaterSpec,
        factory: &dyn UpdaterFactory,
    ) -> Result<&Application> {
        let fullname = spec.fullname.unwrap_or_else(|| name.to_string());
        let path = spec.path.unwrap_or_else(|| self.base.services().cwd.clone());
        let options = match &spec.constructor {
            Constructor::Default => self.base.options().clone(),
            Constructor::Local { config } => {
                log::debug!("Building {} from {}", fullname, config.display());
                Config::load_from(config)?.options
            }
        };

        let mut child = Application::updater(name, &fullname, &path, options, &self.base)?;
        factory.define(&mut child, &self.base, self)?;
        self.base.set_file_fallback(child.files().clone());

        self.base.bus().emit(Event::Register {
            name: name.to_string(),
            fullname: fullname.clone(),
            path: path.clone(),
        });

        let (index, previous) = self.updaters.insert_full(name.to_string(), child);
        if let Some(previous) = previous {
            log::warn!(
                "Updater '{}' from {} replaced by {}",
                name,
                previous.path().display(),
                path.display()
            );
        }
        Ok(&self.updaters[index])
    }

    /// Parse command line tokens against the registered updaters
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<RunRequest, UpdateError> {
        argv::parse(tokens, &self.commands, |name| self.has_updater(name))
    }

    /// Selectable entries: each updater's default task, then its other tasks
    pub fn choices(&self) -> Vec<Choice> {
        let mut choices = Vec::new();
        for (name, app) in &self.updaters {
            choices.push(Choice {
                name: format!("{} (default)", app.fullname()),
                value: name.clone(),
                short: name.clone(),
            });
            for task in app.tasks().names().filter(|t| *t != "default") {
                choices.push(Choice {
                    name: format!("  - {}", task),
                    value: format!("{}:{}", name, task),
                    short: format!("{}:{}", name, task),
                });
            }
        }
        choices
    }

    /// Ask which updaters to run and merge the answers into `request`
    pub fn list(&self, request: &mut RunRequest) -> Result<()> {
        let choices = self.choices();
        if choices.is_empty() {
            log::warn!("No updaters registered");
            return Ok(());
        }

        let answers = self
            .prompt
            .ask_updater_selection("Which updaters would you like to run?", &choices)?;
        for answer in answers {
            for (updater, tasks) in argv::expand(&answer) {
                request.updaters.union(&updater, tasks);
            }
        }
        Ok(())
    }

    /// Run a request: the root command first, then every selected updater
    /// in series, stopping at the first failure
    pub async fn run(&self, mut request: RunRequest) -> Result<()> {
        request.validate()?;

        if let Some(command) = request.command() {
            if command == LIST {
                if request.updaters.is_empty() {
                    self.list(&mut request)?;
                }
            } else {
                self.base.build(&[command.to_string()]).await?;
            }
        }

        if request.commands.is_empty() && request.updaters.is_empty() {
            log::debug!("Nothing selected, running the base default task");
            return self.base.build(&[]).await;
        }

        let mut series = Vec::with_capacity(request.updaters.len());
        for (name, tasks) in request.updaters.iter() {
            let app = self
                .application(name)
                .ok_or_else(|| UpdateError::UpdaterNotFound(name.to_string()))?;
            series.push((app, tasks));
        }

        for (app, tasks) in series {
            self.base.bus().emit(Event::Run {
                updater: app.name().to_string(),
                tasks: tasks.to_vec(),
            });
            app.build(tasks).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Multi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multi")
            .field("base", &self.base)
            .field("updaters", &self.updaters.keys().collect::<Vec<_>>())
            .field("commands", &self.commands)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Services;
    use crate::events::{EventBus, EventKind};
    use crate::store::{Store, StoreOptions};
    use crate::views::FileSet;
    use serde_json::{json, Map, Value};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Answers(Vec<&'static str>);

    impl Prompt for Answers {
        fn ask_updater_selection(&self, _message: &str, _choices: &[Choice]) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn multi(dir: &Path, answers: Vec<&'static str>) -> Multi {
        let options = StoreOptions {
            cwd: dir.join("store"),
            indent: 2,
        };
        let store = Store::open("test", &options).unwrap();
        let services = Services::new(store, EventBus::new(256), dir.to_path_buf());
        let mut options = Map::new();
        options.insert("shared".into(), json!(true));
        let base = Application::base(services, options, FileSet::new());
        let commands = ["init", "list", "store"].iter().map(|s| s.to_string()).collect();
        Multi::new(base, commands, Box::new(Answers(answers)))
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, fail: bool) -> impl UpdaterFactory {
        let log = log.clone();
        move |app: &mut Application, _base: &Application, _multi: &Multi| -> Result<()> {
            let log = log.clone();
            app.task("default", &[], move |ctx| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(format!("{}:{}", ctx.updater, ctx.task));
                    if fail {
                        anyhow::bail!("{} failed", ctx.updater);
                    }
                    Ok(())
                }
            });
            app.alias("lint", &[]);
            Ok(())
        }
    }

    fn spec(fullname: &str) -> UpdaterSpec {
        UpdaterSpec {
            fullname: Some(fullname.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_updaters_run_in_series() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut multi = multi(dir.path(), vec![]);
        multi.register("a", spec("updater-a"), &recorder(&log, false)).unwrap();
        multi.register("b", spec("updater-b"), &recorder(&log, false)).unwrap();

        let request = multi.parse(&["b", "a"]).unwrap();
        multi.run(request).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b:default", "a:default"]);
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_series() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut multi = multi(dir.path(), vec![]);
        multi.register("a", spec("updater-a"), &recorder(&log, true)).unwrap();
        multi.register("b", spec("updater-b"), &recorder(&log, false)).unwrap();

        let request = multi.parse(&["a", "b"]).unwrap();
        let err = multi.run(request).await.unwrap_err();
        assert_eq!(err.to_string(), "a failed");
        assert_eq!(*log.lock().unwrap(), vec!["a:default"]);
    }

    #[tokio::test]
    async fn test_unknown_updater_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut multi = multi(dir.path(), vec![]);
        multi.register("a", spec("updater-a"), &recorder(&log, false)).unwrap();

        let request = multi.parse(&["a", "ghost:default"]).unwrap();
        let err = multi.run(request).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpdateError>(),
            Some(UpdateError::UpdaterNotFound(name)) if name == "ghost"
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_request_runs_base_default() {
        let dir = TempDir::new().unwrap();
        let ran = Arc::new(Mutex::new(false));
        let mut multi = multi(dir.path(), vec![]);
        let flag = ran.clone();
        multi.base_mut().task("default", &[], move |_| {
            let flag = flag.clone();
            async move {
                *flag.lock().unwrap() = true;
                Ok(())
            }
        });

        multi.run(RunRequest::default()).await.unwrap();
        assert!(*ran.lock().unwrap());
    }

    #[tokio::test]
    async fn test_list_merges_selections() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut multi = multi(dir.path(), vec!["b", "a:lint"]);
        multi.register("a", spec("updater-a"), &recorder(&log, false)).unwrap();
        multi.register("b", spec("updater-b"), &recorder(&log, false)).unwrap();

        let values: Vec<_> = multi.choices().into_iter().map(|c| c.value).collect();
        assert_eq!(values, vec!["a", "a:lint", "b", "b:lint"]);

        let request = multi.parse(&["list"]).unwrap();
        multi.run(request).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b:default"]);
    }

    #[test]
    fn test_register_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut multi = multi(dir.path(), vec![]);
        let mut events = multi.base().bus().subscribe(&[EventKind::Register]);

        multi.register("a", spec("updater-a"), &recorder(&log, false)).unwrap();
        multi.register("b", spec("updater-b"), &recorder(&log, false)).unwrap();
        multi.register("a", spec("other-a"), &recorder(&log, false)).unwrap();

        let names: Vec<_> = multi.updaters().map(|u| u.fullname().to_string()).collect();
        assert_eq!(names, vec!["other-a", "updater-b"]);
        assert_eq!(events.drain().len(), 3);
    }

    #[test]
    fn test_default_constructor_inherits_base_options() {
        let dir = TempDir::new().unwrap();
        let mut multi = multi(dir.path(), vec![]);
        let noop = |_: &mut Application, _: &Application, _: &Multi| -> Result<()> { Ok(()) };

        let app = multi.register("a", spec("updater-a"), &noop).unwrap();
        assert_eq!(app.option("shared"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_local_constructor_reads_its_own_options() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yml");
        std::fs::write(&config, "options:\n  local: 1\n").unwrap();

        let mut multi = multi(dir.path(), vec![]);
        let noop = |_: &mut Application, _: &Application, _: &Multi| -> Result<()> { Ok(()) };
        let spec = UpdaterSpec {
            fullname: Some("updater-a".into()),
            path: None,
            constructor: Constructor::Local { config },
        };

        let app = multi.register("a", spec, &noop).unwrap();
        assert_eq!(app.option("local"), Some(&json!(1)));
        assert_eq!(app.option("shared"), None);
    }

    #[test]
    fn test_register_each_discovers_updatefiles() {
        let dir = TempDir::new().unwrap();
        let updaters = dir.path().join("updaters");
        for name in ["updater-foo", "updater-bar"] {
            std::fs::create_dir_all(updaters.join(name)).unwrap();
            std::fs::write(
                updaters.join(name).join(registry::ENTRY_FILE),
                "tasks:\n  default: {}\n  fix: {}\n",
            )
            .unwrap();
        }

        let mut multi = multi(dir.path(), vec![]);
        let count = multi
            .register_each("updater-*", &RegisterOptions::new(&updaters))
            .unwrap();
        assert_eq!(count, 2);
        assert!(multi.has_updater("foo"));
        assert!(multi.updater("bar").unwrap().tasks().contains("fix"));
    }
}
