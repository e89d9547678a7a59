//! Configuration module for TreeBackup
//!
//! CLI arguments, runtime engine settings, and the job file format.

mod job_file;
mod settings;

pub use job_file::*;
pub use settings::*;
