//! Error types for TreeBackup
//!
//! Every failure the engine can record during a run has a variant here.
//! Only a few of them are fatal to a run; the rest are logged, counted and
//! the affected subtree or file is abandoned.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for TreeBackup operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A path referenced by a job does not exist
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Destination subdirectory could not be created
    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Source directory could not be opened for enumeration
    #[error("Failed to list directory '{path}': {source}")]
    DirectoryList {
        /// Directory that could not be read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A single file copy failed
    #[error("Failed to copy file '{source_path}' to '{dest_path}': {source}")]
    FileCopy {
        /// File being read
        source_path: PathBuf,
        /// File being written
        dest_path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed job file
    #[error("Job file error at line {line}: {message}")]
    JobFile {
        /// 1-based line number, 0 when not tied to a line
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Nothing was committed, so nothing ran
    #[error("No backups committed")]
    NoCommits,

    /// Pending work stopped making progress
    #[error("Run stalled: {pending} task(s) pending with no progress for {}", fmt_duration(.idle_for))]
    Stalled {
        /// Tasks still outstanding
        pending: usize,
        /// Time since anything last changed
        idle_for: Duration,
    },

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Operation cancelled by user
    #[error("Operation cancelled")]
    Cancelled,
}

impl BackupError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a job file error for the given (1-based) line
    pub fn job_file(line: usize, message: impl Into<String>) -> Self {
        Self::JobFile {
            line,
            message: message.into(),
        }
    }

    /// Short label used when the error is written to the error log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::NotFound(_) => "not-found",
            Self::DirectoryCreate { .. } => "dir-create",
            Self::DirectoryList { .. } => "dir-list",
            Self::FileCopy { .. } => "file-copy",
            Self::JobFile { .. } => "job-file",
            Self::ConfigError(_) => "config",
            Self::NoCommits => "no-commits",
            Self::Stalled { .. } => "stalled",
            Self::ThreadPoolError(_) => "thread-pool",
            Self::Cancelled => "cancelled",
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::NotFound(path)
            | Self::DirectoryCreate { path, .. }
            | Self::DirectoryList { path, .. } => Some(path),
            Self::FileCopy { source_path, .. } => Some(source_path),
            _ => None,
        }
    }

    /// Underlying OS error, if this error wraps one
    pub fn os_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::Io { source, .. }
            | Self::DirectoryCreate { source, .. }
            | Self::DirectoryList { source, .. }
            | Self::FileCopy { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn fmt_duration(d: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*d)
}

/// Result type alias for TreeBackup operations
pub type Result<T> = std::result::Result<T, BackupError>;

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        BackupError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| BackupError::io(path, e))
    }
}
