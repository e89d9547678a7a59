//! Backup orchestration
//!
//! Seeds one root directory task per included source of every valid commit,
//! waits for the pending count to drain, then stops the workers and reports.

use crate::config::{Commit, EngineConfig, JobPlan};
use crate::core::{BackupJob, CancellationToken, CountersSnapshot, RunContext, WorkerPool};
use crate::error::{BackupError, Result};
use crate::fs::{CopyOptions, DirectoryLister, ExclusionSet, FileCopier, FsLister};
use crate::progress::{ErrorLog, RunReport};
use crate::sync::SkipPolicy;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the orchestrator wakes to check for stalls
const COMPLETION_POLL: Duration = Duration::from_millis(250);

/// Main backup engine
pub struct BackupEngine {
    /// Configuration
    config: EngineConfig,
    /// Directory enumeration
    lister: Arc<dyn DirectoryLister>,
    /// Token for the next (or in-progress) run; replaced when a run ends
    cancel: Mutex<CancellationToken>,
}

impl BackupEngine {
    /// Create a new engine over the real filesystem
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            lister: Arc::new(FsLister),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Use a different directory lister
    pub fn with_lister(mut self, lister: Arc<dyn DirectoryLister>) -> Self {
        self.lister = lister;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token controlling the next run, or the current one while a run is in
    /// progress. Each run gets its own token, so cancelling one run (or a
    /// stall aborting it) does not affect later runs on the same engine.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Cancel the current (or next) run. Queued work is discarded, not performed.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    /// Run every valid commit of `plan` to completion.
    ///
    /// Runs on one engine are expected to be sequential.
    pub fn run(&self, plan: &JobPlan) -> Result<RunReport> {
        let cancel = self.cancellation_token();
        let result = self.run_with(plan, &cancel);
        *self.cancel.lock() = CancellationToken::new();
        result
    }

    fn run_with(&self, plan: &JobPlan, cancel: &CancellationToken) -> Result<RunReport> {
        let start = Instant::now();

        let commits_honoured = plan.honoured_commits();
        if commits_honoured == 0 {
            return Err(BackupError::NoCommits);
        }

        let error_log = match &self.config.error_log {
            Some(path) => ErrorLog::open(path)?,
            None => ErrorLog::disabled(),
        };

        let copier = FileCopier::new(CopyOptions {
            buffer_size: self.config.buffer_size,
            preserve_mtime: self.config.preserve_mtime,
            ..Default::default()
        });

        let mut ctx = RunContext::new(
            Arc::clone(&self.lister),
            copier,
            SkipPolicy::new(self.config.tolerance),
            error_log,
            cancel.clone(),
        );
        ctx.follow_symlinks = self.config.follow_symlinks;
        ctx.idle_poll = self.config.idle_poll;
        let ctx = Arc::new(ctx);

        let threads = self.config.effective_threads();
        let pool = WorkerPool::spawn(Arc::clone(&ctx), threads)?;
        tracing::debug!("Started {} worker(s)", pool.len());

        for commit in plan.valid_commits() {
            let Some(dest_root) = &commit.dest_root else {
                continue;
            };
            for source in &commit.included_dirs {
                tracing::info!("Queueing backup of {} into {}", source.display(), dest_root.display());
                ctx.pending.increment();
                ctx.queues.push_dir(BackupJob::root(
                    source.clone(),
                    dest_root.clone(),
                    Arc::clone(&commit.exclusions),
                ));
            }
        }

        tracing::info!("Waiting for {} task(s) to complete", ctx.pending.get());

        if let Err(e) = self.wait_for_completion(&ctx) {
            cancel.cancel();
            ctx.finish();
            // A stalled worker may never return; don't wait for it.
            pool.detach();
            return Err(e);
        }

        ctx.finish();
        pool.join()?;

        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }

        let report = RunReport {
            commits_honoured,
            startup_errors: plan.startup_errors(),
            threads,
            counters: ctx.counters.snapshot(),
            elapsed: start.elapsed(),
        };
        tracing::info!("Finished, no tasks remaining");
        Ok(report)
    }

    /// Block until the pending count reaches zero, or fail with
    /// [`BackupError::Stalled`] when the stall detector is enabled and
    /// nothing has moved for `stall_timeout`
    fn wait_for_completion(&self, ctx: &RunContext) -> Result<()> {
        let poll = match self.config.stall_timeout {
            Some(timeout) => timeout.min(COMPLETION_POLL),
            None => COMPLETION_POLL,
        };

        let mut last: (usize, CountersSnapshot) = (ctx.pending.get(), ctx.counters.snapshot());
        let mut last_change = Instant::now();

        while !ctx.pending.wait_until_zero(poll) {
            let Some(timeout) = self.config.stall_timeout else {
                continue;
            };

            let current = (ctx.pending.get(), ctx.counters.snapshot());
            if current != last {
                last = current;
                last_change = Instant::now();
                continue;
            }

            let idle_for = last_change.elapsed();
            if ctx.queues.is_empty() && idle_for >= timeout {
                tracing::error!(
                    "No progress for {} with {} task(s) pending; aborting",
                    humantime::format_duration(Duration::from_secs(idle_for.as_secs())),
                    current.0
                );
                return Err(BackupError::Stalled {
                    pending: current.0,
                    idle_for,
                });
            }
        }

        Ok(())
    }
}

/// Back up `sources` into `dest` with default settings
pub fn simple_backup(sources: &[&Path], dest: &Path) -> Result<RunReport> {
    let commit = Commit::new(
        dest,
        sources.iter().map(|p| p.to_path_buf()).collect(),
        ExclusionSet::new(),
    );
    BackupEngine::new(EngineConfig::default()).run(&JobPlan::from_commits(vec![commit]))
}
