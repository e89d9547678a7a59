//! Directory expansion
//!
//! Turns one directory task into child directory tasks and file copy tasks.

use crate::core::{BackupJob, FileCopyTask, RunContext, RunCounters};
use crate::error::BackupError;
use crate::fs::{dotted_extension, DirEntryInfo, EntryKind};
use std::path::Path;

/// Expands directory tasks against a [`RunContext`]
pub struct DirectoryExpander<'a> {
    ctx: &'a RunContext,
}

impl<'a> DirectoryExpander<'a> {
    /// Create an expander for `ctx`
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Expand `job`, then release its pending slot.
    ///
    /// Children are counted before they are queued, so the pending count
    /// cannot reach zero while this subtree still has work.
    pub fn expand(&self, job: BackupJob) {
        self.expand_inner(&job);
        self.ctx.pending.decrement_by(1);
    }

    fn expand_inner(&self, job: &BackupJob) {
        let ctx = self.ctx;

        if ctx.cancel.is_cancelled() {
            RunCounters::bump(&ctx.counters.tasks_cancelled);
            return;
        }

        let dest = job.dest_subdir();
        let mut skip_checks = job.skip_checks_enabled;

        if !dest.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&dest) {
                ctx.record_error(&BackupError::DirectoryCreate { path: dest, source: e });
                return;
            }
            RunCounters::bump(&ctx.counters.dirs_created);
            // Nothing below a fresh directory can be up to date
            skip_checks = false;
        }

        let entries = match ctx.lister.list(&job.source_dir) {
            Ok(entries) => entries,
            Err(e) => {
                ctx.record_error(&BackupError::DirectoryList {
                    path: job.source_dir.clone(),
                    source: e,
                });
                return;
            }
        };

        tracing::info!(
            "Backing up {} ({} entries, {} pending)",
            job.source_dir.display(),
            entries.len(),
            ctx.pending.get()
        );

        for entry in entries {
            if entry.is_pseudo() {
                continue;
            }
            match entry.kind {
                EntryKind::SymlinkDir if !ctx.follow_symlinks => {
                    tracing::debug!(
                        "Not following symlinked directory {}",
                        job.source_dir.join(&entry.name).display()
                    );
                }
                EntryKind::Directory | EntryKind::SymlinkDir => {
                    self.enqueue_dir(job, &entry, &dest, skip_checks);
                }
                EntryKind::File => {
                    self.enqueue_file(job, &entry, &dest, skip_checks);
                }
                EntryKind::Other => {
                    tracing::debug!(
                        "Ignoring special file {}",
                        job.source_dir.join(&entry.name).display()
                    );
                }
            }
        }
    }

    fn enqueue_dir(&self, job: &BackupJob, entry: &DirEntryInfo, dest: &Path, skip_checks: bool) {
        let ctx = self.ctx;
        let source_dir = job.source_dir.join(&entry.name);

        if job.exclusions.is_dir_excluded(&source_dir) {
            RunCounters::bump(&ctx.counters.dirs_excluded);
            tracing::info!("Excluding directory {}", source_dir.display());
            return;
        }

        tracing::trace!("Queueing directory {}", source_dir.display());
        let child = job.child(source_dir, dest, skip_checks);
        ctx.pending.increment();
        ctx.queues.push_dir(child);
    }

    fn enqueue_file(&self, job: &BackupJob, entry: &DirEntryInfo, dest: &Path, skip_checks: bool) {
        let ctx = self.ctx;
        let source_path = job.source_dir.join(&entry.name);

        if let Some(ext) = dotted_extension(&source_path) {
            if job.exclusions.is_file_excluded(&ext) {
                RunCounters::bump(&ctx.counters.files_excluded);
                tracing::info!("Excluding file {}", source_path.display());
                return;
            }
        }

        let dest_path = dest.join(&entry.name);
        let dest_stat = match ctx.lister.stat(&dest_path) {
            Ok(stat) => stat,
            Err(e) => {
                tracing::debug!("Cannot stat {}: {}; copying", dest_path.display(), e);
                None
            }
        };

        let decision = ctx.policy.decide(&entry.stat, dest_stat.as_ref(), skip_checks);
        if !decision.should_copy() {
            RunCounters::bump(&ctx.counters.files_skipped);
            tracing::debug!("Up to date: {}", source_path.display());
            return;
        }

        tracing::trace!("Queueing {} ({:?})", source_path.display(), decision);
        ctx.pending.increment();
        ctx.queues.push_file(FileCopyTask {
            source_path,
            dest_path,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CancellationToken;
    use crate::fs::{ExclusionSet, FileCopier, FsLister};
    use crate::progress::ErrorLog;
    use crate::sync::SkipPolicy;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context() -> RunContext {
        RunContext::new(
            Arc::new(FsLister),
            FileCopier::default(),
            SkipPolicy::default(),
            ErrorLog::disabled(),
            CancellationToken::new(),
        )
    }

    fn write(path: &Path, size: usize) {
        File::create(path).unwrap().write_all(&vec![b'x'; size]).unwrap();
    }

    fn seed(ctx: &RunContext, job: BackupJob) {
        ctx.pending.increment();
        DirectoryExpander::new(ctx).expand(job);
    }

    #[test]
    fn test_expand_creates_dest_and_queues_children() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("A");
        std::fs::create_dir_all(root.join("sub")).unwrap();
        write(&root.join("x.txt"), 10);

        let ctx = context();
        seed(&ctx, BackupJob::root(&root, dst.path(), Arc::new(ExclusionSet::new())));

        assert!(dst.path().join("A").is_dir());
        assert_eq!(ctx.pending.get(), 2);

        let file = ctx.queues.try_pop_file().unwrap();
        assert_eq!(file.dest_path, dst.path().join("A/x.txt"));

        let child = ctx.queues.try_pop_dir().unwrap();
        assert_eq!(child.source_dir, root.join("sub"));
        assert_eq!(child.dest_dir, dst.path().join("A"));
        assert!(!child.skip_checks_enabled);
        assert_eq!(ctx.counters.snapshot().dirs_created, 1);
    }

    #[test]
    fn test_expand_applies_exclusions() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("A");
        std::fs::create_dir_all(root.join("cache")).unwrap();
        write(&root.join("keep.txt"), 1);
        write(&root.join("drop.log"), 1);
        write(&root.join("README"), 1);

        let rules = ExclusionSet::new().with_dir("cache").with_extension(".log");
        let ctx = context();
        seed(&ctx, BackupJob::root(&root, dst.path(), Arc::new(rules)));

        let snap = ctx.counters.snapshot();
        assert_eq!(snap.dirs_excluded, 1);
        assert_eq!(snap.files_excluded, 1);
        assert_eq!(ctx.queues.file_len(), 2);
        assert_eq!(ctx.queues.dir_len(), 0);
        assert_eq!(ctx.pending.get(), 2);
    }

    #[test]
    fn test_existing_up_to_date_file_is_skipped() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("A");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(dst.path().join("A")).unwrap();
        write(&root.join("same.txt"), 10);
        write(&dst.path().join("A/same.txt"), 10);
        write(&root.join("grown.txt"), 20);
        write(&dst.path().join("A/grown.txt"), 10);

        let ctx = context();
        seed(&ctx, BackupJob::root(&root, dst.path(), Arc::new(ExclusionSet::new())));

        assert_eq!(ctx.counters.snapshot().files_skipped, 1);
        assert_eq!(ctx.counters.snapshot().dirs_created, 0);
        let task = ctx.queues.try_pop_file().unwrap();
        assert_eq!(task.source_path, root.join("grown.txt"));
        assert!(ctx.queues.try_pop_file().is_none());
    }

    #[test]
    fn test_list_failure_is_counted_and_released() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let missing = src.path().join("gone");

        let ctx = context();
        seed(&ctx, BackupJob::root(&missing, dst.path(), Arc::new(ExclusionSet::new())));

        assert_eq!(ctx.counters.snapshot().errors, 1);
        assert!(ctx.pending.is_zero());
        assert!(ctx.queues.is_empty());
    }

    #[test]
    fn test_dest_create_failure_is_counted() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("A");
        std::fs::create_dir_all(&root).unwrap();
        write(&root.join("x.txt"), 1);
        // A plain file where the destination directory should go
        write(&dst.path().join("A"), 1);

        let ctx = context();
        seed(&ctx, BackupJob::root(&root, dst.path(), Arc::new(ExclusionSet::new())));

        assert_eq!(ctx.counters.snapshot().errors, 1);
        assert!(ctx.pending.is_zero());
        assert!(ctx.queues.is_empty());
    }

    #[test]
    fn test_cancelled_expansion_enqueues_nothing() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("A");
        std::fs::create_dir_all(&root).unwrap();
        write(&root.join("x.txt"), 1);

        let ctx = context();
        ctx.cancel.cancel();
        seed(&ctx, BackupJob::root(&root, dst.path(), Arc::new(ExclusionSet::new())));

        assert!(ctx.pending.is_zero());
        assert!(ctx.queues.is_empty());
        assert!(!dst.path().join("A").exists());
        assert_eq!(ctx.counters.snapshot().tasks_cancelled, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dirs_need_opt_in() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("A");
        let elsewhere = src.path().join("elsewhere");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&elsewhere).unwrap();
        std::os::unix::fs::symlink(&elsewhere, root.join("link")).unwrap();

        let ctx = context();
        seed(&ctx, BackupJob::root(&root, dst.path(), Arc::new(ExclusionSet::new())));
        assert!(ctx.queues.try_pop_dir().is_none());

        let mut ctx = context();
        ctx.follow_symlinks = true;
        let dst2 = TempDir::new().unwrap();
        seed(&ctx, BackupJob::root(&root, dst2.path(), Arc::new(ExclusionSet::new())));
        assert_eq!(ctx.queues.try_pop_dir().unwrap().source_dir, root.join("link"));
    }
}
