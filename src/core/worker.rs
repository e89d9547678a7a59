//! Fixed-size worker pool
//!
//! Every worker runs the same loop: take a file task if there is one, else a
//! directory task, else sleep in [`wait_for_work`](crate::core::TaskQueues::wait_for_work) until something
//! arrives. A worker stops once the run is finished and both queues are empty.

use crate::core::{DirectoryExpander, FileCopyTask, RunContext, RunCounters};
use crate::error::{BackupError, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

/// Handles to the running workers
pub struct WorkerPool {
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `threads` workers on `ctx`
    pub fn spawn(ctx: Arc<RunContext>, threads: usize) -> Result<Self> {
        let mut handles = Vec::with_capacity(threads);

        for worker_id in 0..threads.max(1) {
            let ctx = Arc::clone(&ctx);
            let handle = thread::Builder::new()
                .name(format!("treebackup-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, &ctx))
                .map_err(|e| BackupError::ThreadPoolError(format!("Failed to spawn worker {}: {}", worker_id, e)))?;
            handles.push(handle);
        }

        Ok(Self { handles })
    }

    /// Number of workers
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if the pool has no workers
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. The run must already be finished.
    pub fn join(self) -> Result<()> {
        let mut panicked = 0;
        for handle in self.handles {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            return Err(BackupError::ThreadPoolError(format!("{} worker(s) panicked", panicked)));
        }
        Ok(())
    }

    /// Let the workers run to completion on their own
    pub fn detach(self) {
        tracing::debug!("Detaching {} worker(s)", self.handles.len());
    }
}

fn worker_loop(worker_id: usize, ctx: &RunContext) {
    tracing::debug!("Worker {} started", worker_id);
    let expander = DirectoryExpander::new(ctx);

    loop {
        if let Some(task) = ctx.queues.try_pop_file() {
            copy_file(ctx, task);
            continue;
        }
        if let Some(job) = ctx.queues.try_pop_dir() {
            expander.expand(job);
            continue;
        }
        if ctx.is_finished() && ctx.queues.is_empty() {
            break;
        }
        let wakeup = ctx.queues.wait_for_work(ctx.idle_poll);
        tracing::trace!("Worker {} woke: {:?}", worker_id, wakeup);
    }

    tracing::debug!("Worker {} shutting down", worker_id);
}

fn copy_file(ctx: &RunContext, task: FileCopyTask) {
    if ctx.cancel.is_cancelled() {
        RunCounters::bump(&ctx.counters.tasks_cancelled);
    } else {
        match ctx.copier.copy(&task.source_path, &task.dest_path) {
            Ok(stats) => {
                RunCounters::bump(&ctx.counters.files_copied);
                ctx.counters.bytes_copied.fetch_add(stats.bytes_copied, Ordering::Relaxed);
                tracing::debug!(
                    "Copied {} -> {} ({})",
                    task.source_path.display(),
                    task.dest_path.display(),
                    humansize::format_size(stats.bytes_copied, humansize::BINARY)
                );
            }
            Err(e) => {
                let error = match e {
                    BackupError::Io { source, .. } => BackupError::FileCopy {
                        source_path: task.source_path,
                        dest_path: task.dest_path,
                        source,
                    },
                    other => other,
                };
                ctx.record_error(&error);
            }
        }
    }
    ctx.pending.decrement_by(1);
}
