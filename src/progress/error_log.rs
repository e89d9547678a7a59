//! Append-only error log
//!
//! Each failure is written as one line:
//! `<timestamp> [<kind>] <path>: <error>`

use crate::error::{BackupError, IoResultExt, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Shared, serialized writer for failed operations
#[derive(Debug)]
pub struct ErrorLog {
    path: Option<PathBuf>,
    writer: Option<Mutex<BufWriter<File>>>,
}

impl ErrorLog {
    /// Open (or create) `path` for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_path(path)?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            writer: Some(Mutex::new(BufWriter::new(file))),
        })
    }

    /// A log that discards everything
    pub fn disabled() -> Self {
        Self {
            path: None,
            writer: None,
        }
    }

    /// Log file location, if enabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Is anything being written?
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Append one error entry
    pub fn record(&self, error: &BackupError) {
        let Some(writer) = &self.writer else {
            return;
        };

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let path = error
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());

        let mut writer = writer.lock();
        let written = writeln!(writer, "{} [{}] {}: {}", timestamp, error.kind(), path, error)
            .and_then(|_| writer.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to write error log: {}", e);
        }
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::disabled()
    }
}
