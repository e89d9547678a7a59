//! Units of work flowing through the task queues

use crate::fs::ExclusionSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A directory awaiting enumeration and expansion
#[derive(Debug, Clone)]
pub struct BackupJob {
    /// Source directory to expand
    pub source_dir: PathBuf,
    /// Directory under which the mirrored copy of `source_dir` lives
    pub dest_dir: PathBuf,
    /// Exclusion rules of the commit this job descends from
    pub exclusions: Arc<ExclusionSet>,
    /// Whether existing destination files may be skipped
    pub skip_checks_enabled: bool,
}

impl BackupJob {
    /// Root job for one included source directory of a commit
    pub fn root(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>, exclusions: Arc<ExclusionSet>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            exclusions,
            skip_checks_enabled: true,
        }
    }

    /// Where the contents of `source_dir` are mirrored.
    ///
    /// `dest_dir/<last component of source_dir>`, or `dest_dir` itself when
    /// the source has no final component (e.g. `/`).
    pub fn dest_subdir(&self) -> PathBuf {
        match self.source_dir.file_name() {
            Some(name) => self.dest_dir.join(name),
            None => self.dest_dir.clone(),
        }
    }

    /// Job for a child directory, inheriting rules and the skip-check flag
    pub fn child(&self, source_dir: PathBuf, dest_dir: &Path, skip_checks_enabled: bool) -> Self {
        Self {
            source_dir,
            dest_dir: dest_dir.to_path_buf(),
            exclusions: Arc::clone(&self.exclusions),
            skip_checks_enabled,
        }
    }
}

/// One concrete file copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCopyTask {
    /// File to read
    pub source_path: PathBuf,
    /// File to create or overwrite
    pub dest_path: PathBuf,
}
