//! Update - compose globally installed updaters into one command line
//!
//! Updaters are directories with an `updatefile.yml` declaring tasks.
//! They are discovered under a shared directory, registered on a root
//! application and run in series against a persistent JSON store.

pub mod app;
pub mod argv;
pub mod cli;
pub mod config;
pub mod core;
pub mod dotted;
pub mod error;
pub mod events;
pub mod multi;
pub mod prompt;
pub mod registry;
pub mod report;
pub mod store;
pub mod tasks;
pub mod views;

// Re-exports
pub use app::{Application, Services};
pub use argv::{RunRequest, TaskSelection};
pub use config::Config;
pub use crate::core::{Task, TaskContext, TaskGraph, UpdateFile};
pub use error::{format_error, PluginError, UpdateError};
pub use events::{Event, EventBus, EventKind};
pub use multi::Multi;
pub use prompt::{CheckboxPrompt, Choice, Prompt};
pub use registry::{RegisterOptions, UpdaterFactory};
pub use store::{Delete, SharedStore, Store, StoreOptions};

/// Result type alias
pub type Result<T> = anyhow::Result<T>;

/// Update engine - main entry point for library usage
pub struct UpdateEngine {
    config: Config,
    multi: Multi,
}

impl UpdateEngine {
    /// Open the store, register the built-in tasks and every updater
    /// found in `config.updaters_dir`
    ///
    /// Registration events are sent on `bus`, so subscribe before calling.
    pub fn from_config(
        config: Config,
        cwd: std::path::PathBuf,
        bus: EventBus,
        prompt: Box<dyn Prompt>,
    ) -> Result<Self> {
        let store_options = StoreOptions {
            cwd: config.store_dir.clone(),
            indent: config.indent,
        };
        let store = Store::open(&config.store_name, &store_options)?;
        let services = Services::new(store, bus, cwd);

        let files = views::FileSet::load_dir(&config.templates_dir)?;
        let mut base = Application::base(services, config.options.clone(), files);
        tasks::register_builtins(&mut base);

        let mut multi = Multi::new(base, config.commands.clone(), prompt);
        multi.register_each(&config.pattern, &RegisterOptions::new(&config.updaters_dir))?;

        Ok(Self { config, multi })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn multi(&self) -> &Multi {
        &self.multi
    }

    pub fn multi_mut(&mut self) -> &mut Multi {
        &mut self.multi
    }

    pub fn bus(&self) -> &EventBus {
        self.multi.base().bus()
    }

    pub fn store(&self) -> &SharedStore {
        self.multi.base().store()
    }

    /// Parse `tokens` and run them
    pub async fn run<S: AsRef<str>>(&self, tokens: &[S]) -> Result<()> {
        let request = self.multi.parse(tokens)?;
        self.multi.run(request).await
    }
}
