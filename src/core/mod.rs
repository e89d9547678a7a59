//! Core backup engine module
//!
//! Provides the task queues, completion tracking, directory expansion,
//! the worker pool and the orchestrating [`BackupEngine`].

mod context;
mod engine;
mod expander;
mod scheduler;
mod task;
mod worker;

pub use context::*;
pub use engine::*;
pub use expander::*;
pub use scheduler::*;
pub use task::*;
pub use worker::*;
