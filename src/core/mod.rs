//! Core engine - task graphs, updatefiles, command execution and copy steps

pub mod copy;
mod executor;
mod task;
mod updatefile;

pub use copy::Dest;
pub use executor::run_command;
pub use task::{Task, TaskContext, TaskFn, TaskFuture, TaskGraph};
pub use updatefile::{CopyStep, TaskDef, UpdateFile};
