//! Per-run shared state
//!
//! Everything a worker needs is reachable from one [`RunContext`], shared
//! through an `Arc`. Nothing here is global; two engines can run side by side.

use crate::core::{PendingCounter, TaskQueues};
use crate::error::BackupError;
use crate::fs::{DirectoryLister, FileCopier};
use crate::progress::ErrorLog;
use crate::sync::SkipPolicy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Run statistics, updated by the workers
#[derive(Debug, Default)]
pub struct RunCounters {
    /// Files copied successfully
    pub files_copied: AtomicU64,
    /// Files found up to date
    pub files_skipped: AtomicU64,
    /// Directories skipped by a substring rule
    pub dirs_excluded: AtomicU64,
    /// Files skipped by an extension rule
    pub files_excluded: AtomicU64,
    /// Failed listings, directory creations and copies
    pub errors: AtomicU64,
    /// Bytes written by successful copies
    pub bytes_copied: AtomicU64,
    /// Destination directories created
    pub dirs_created: AtomicU64,
    /// Tasks discarded after cancellation
    pub tasks_cancelled: AtomicU64,
}

impl RunCounters {
    /// Add one to `counter`
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough copy of every counter
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            files_copied: self.files_copied.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            dirs_excluded: self.dirs_excluded.load(Ordering::Relaxed),
            files_excluded: self.files_excluded.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            dirs_created: self.dirs_created.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`RunCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    /// Files copied successfully
    pub files_copied: u64,
    /// Files found up to date
    pub files_skipped: u64,
    /// Directories skipped by a substring rule
    pub dirs_excluded: u64,
    /// Files skipped by an extension rule
    pub files_excluded: u64,
    /// Failed operations
    pub errors: u64,
    /// Bytes written
    pub bytes_copied: u64,
    /// Destination directories created
    pub dirs_created: u64,
    /// Tasks discarded after cancellation
    pub tasks_cancelled: u64,
}

/// Cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// State shared by the orchestrator and all workers of one run
pub struct RunContext {
    /// Directory and file queues
    pub queues: TaskQueues,
    /// Outstanding task count
    pub pending: PendingCounter,
    /// Statistics
    pub counters: RunCounters,
    /// Cancellation flag
    pub cancel: CancellationToken,
    /// Directory enumeration
    pub lister: Arc<dyn DirectoryLister>,
    /// Byte copier
    pub copier: FileCopier,
    /// Skip decision
    pub policy: SkipPolicy,
    /// Failure record
    pub error_log: ErrorLog,
    /// Descend into symlinked directories
    pub follow_symlinks: bool,
    /// Upper bound on a worker's idle sleep
    pub idle_poll: Duration,
    finished: AtomicBool,
}

impl RunContext {
    /// Create a context with empty queues and zeroed counters
    pub fn new(
        lister: Arc<dyn DirectoryLister>,
        copier: FileCopier,
        policy: SkipPolicy,
        error_log: ErrorLog,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queues: TaskQueues::new(),
            pending: PendingCounter::new(),
            counters: RunCounters::default(),
            cancel,
            lister,
            copier,
            policy,
            error_log,
            follow_symlinks: false,
            idle_poll: Duration::from_millis(50),
            finished: AtomicBool::new(false),
        }
    }

    /// Mark the run finished; workers exit once both queues are empty
    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.queues.signal_shutdown();
    }

    /// Has the run been marked finished?
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Count, print and log a failure
    pub fn record_error(&self, error: &BackupError) {
        RunCounters::bump(&self.counters.errors);
        tracing::error!("{}", error);
        self.error_log.record(error);
    }
}
