//! # TreeBackup - Concurrent Incremental File-Tree Backup
//!
//! TreeBackup mirrors source directory trees into a backup root using a fixed
//! pool of worker threads. Files whose backup copy is already current (same
//! size, not older than the source by more than a tolerance) are skipped, so
//! re-running a job only copies what changed.
//!
//! ## Features
//!
//! - **Two-level work queue**: directory expansions and file copies flow
//!   through separate channels; workers always prefer file copies
//! - **Exact completion detection** for a task graph that grows while it runs
//! - **Per-commit exclusions**: directory substrings and file extensions
//! - **Size/mtime skip policy** with a configurable tolerance window
//! - **Stall detection** and cooperative cancellation
//!
//! ## Quick Start
//!
//! ```no_run
//! use treebackup::core::simple_backup;
//! use std::path::Path;
//!
//! let report = simple_backup(&[Path::new("/home/alice/projects")], Path::new("/mnt/backup")).unwrap();
//! println!("Copied {} files, skipped {}", report.counters.files_copied, report.counters.files_skipped);
//! ```
//!
//! ## Job Files
//!
//! ```no_run
//! use treebackup::config::{EngineConfig, JobPlan};
//! use treebackup::core::BackupEngine;
//!
//! let plan = JobPlan::from_file("nightly.job").unwrap();
//! let engine = BackupEngine::new(EngineConfig {
//!     threads: 16,
//!     ..Default::default()
//! });
//!
//! let report = engine.run(&plan).unwrap();
//! report.print_summary();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod progress;
pub mod sync;

// Re-export commonly used types
pub use config::{EngineConfig, JobPlan};
pub use core::{BackupEngine, CancellationToken};
pub use error::{BackupError, Result};
pub use progress::RunReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use treebackup::prelude::*;
    //! ```

    pub use crate::config::{Commit, EngineConfig, JobPlan};
    pub use crate::core::{simple_backup, BackupEngine, CancellationToken, CountersSnapshot};
    pub use crate::error::{BackupError, Result};
    pub use crate::fs::{DirectoryLister, ExclusionSet, FsLister};
    pub use crate::progress::{ErrorLog, RunReport};
    pub use crate::sync::SkipPolicy;
}
