//! Reporter - prints task progress from the event stream and remembers
//! whether anything failed

use crate::error::UpdateError;
use crate::events::{Event, EventBus, Subscription};
use crossterm::style::Stylize;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct Reporter {
    verbose: bool,
    failed: bool,
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            failed: false,
        }
    }

    /// Start reporting on a background task; resolves to `true` once
    /// `Finished` is seen if a task failure was printed
    pub fn spawn(bus: &EventBus, verbose: bool) -> JoinHandle<bool> {
        let events = bus.subscribe_all();
        tokio::spawn(Self::new(verbose).run(events))
    }

    pub async fn run(mut self, mut events: Subscription) -> bool {
        while let Some(event) = events.recv().await {
            if let Event::Finished { .. } = event {
                return self.failed();
            }
            if let Some(line) = self.render(&event) {
                println!("{}", line);
            }
        }
        self.failed
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Line printed for `event`, if any
    pub fn render(&mut self, event: &Event) -> Option<String> {
        if event.is_failure() {
            self.failed = true;
        }

        match event {
            Event::TaskStart { updater, task } => Some(format!(
                "starting '{}'",
                qualified(updater, task).cyan()
            )),
            Event::TaskStop {
                updater,
                task,
                duration,
            } => Some(format!(
                "finished '{}' after {}",
                qualified(updater, task).cyan(),
                format_duration(*duration).magenta()
            )),
            Event::TaskErr {
                updater,
                task,
                duration,
                error,
            } => Some(format!(
                "'{}' {} after {}\n{}",
                qualified(updater, task).cyan(),
                "errored".red(),
                format_duration(*duration).magenta(),
                error.as_str().red()
            )),
            Event::TaskNotFound { updater, task } => {
                let err = UpdateError::TaskNotFound {
                    updater: updater.clone(),
                    task: task.clone(),
                };
                Some(err.to_string().red().to_string())
            }
            _ if !self.verbose => None,
            Event::Register {
                name,
                fullname,
                path,
            } => Some(format!(
                "registered updater '{}' ({}) from {}",
                name.as_str().cyan(),
                fullname,
                path.display()
            )),
            Event::Run { updater, tasks } => Some(format!(
                "running '{}' [{}]",
                updater.as_str().cyan(),
                tasks.join(", ")
            )),
            Event::StoreSet { key, value } => Some(format!("store set {} = {}", key, value)),
            Event::StoreHas { key, present } => Some(format!("store has {}: {}", key, present)),
            Event::StoreGet { key, value } => Some(match value {
                Some(value) => format!("store get {} = {}", key, value),
                None => format!("store get {} (missing)", key),
            }),
            Event::StoreDel { key } => Some(format!("store del {}", key)),
            _ => None,
        }
    }
}

fn qualified(updater: &str, task: &str) -> String {
    if updater == crate::app::BASE {
        task.to_string()
    } else {
        format!("{}:{}", updater, task)
    }
}

/// Format a duration as a short human string (`850 μs`, `12 ms`, `1.25 s`, `1m 30s`)
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d < Duration::from_millis(1) {
        format!("{} μs", d.as_micros())
    } else if d < Duration::from_secs(1) {
        format!("{} ms", d.as_millis())
    } else if secs < 60 {
        format!("{:.2} s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
