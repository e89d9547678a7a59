//! File copy operations
//!
//! Plain buffered copy with attribute preservation. The destination is
//! truncated and overwritten in place, except that a read-only destination is
//! removed first. There is no temp-file-and-rename step.

use crate::error::{IoResultExt, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Copy operation statistics
#[derive(Debug, Clone, Default)]
pub struct CopyStats {
    /// Bytes copied
    pub bytes_copied: u64,
    /// Duration of the copy
    pub duration: Duration,
    /// Throughput in bytes/second
    pub throughput: f64,
}

impl CopyStats {
    /// Calculate throughput from bytes and duration
    pub fn calculate_throughput(&mut self) {
        if self.duration.as_secs_f64() > 0.0 {
            self.throughput = self.bytes_copied as f64 / self.duration.as_secs_f64();
        }
    }
}

/// Options for file copy operations
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Buffer size for buffered operations
    pub buffer_size: usize,
    /// Preserve file permissions
    pub preserve_permissions: bool,
    /// Preserve modification time
    pub preserve_mtime: bool,
    /// Sync to disk after copy
    pub sync: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            buffer_size: 1024 * 1024, // 1MB
            preserve_permissions: true,
            preserve_mtime: true,
            sync: false,
        }
    }
}

/// Buffered file copier used by the worker pool
#[derive(Debug, Clone)]
pub struct FileCopier {
    options: CopyOptions,
}

impl FileCopier {
    /// Create a new file copier with the given options
    pub fn new(options: CopyOptions) -> Self {
        Self { options }
    }

    /// Create with default options
    pub fn default_copier() -> Self {
        Self::new(CopyOptions::default())
    }

    /// Options in use
    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Copy `source` over `dest`, replacing it if present.
    ///
    /// The parent of `dest` must already exist.
    pub fn copy(&self, source: &Path, dest: &Path) -> Result<CopyStats> {
        let start = Instant::now();

        let bytes_copied = self.copy_buffered(source, dest)?;

        if self.options.preserve_permissions {
            self.copy_permissions(source, dest)?;
        }

        if self.options.preserve_mtime {
            self.copy_mtime(source, dest)?;
        }

        if self.options.sync {
            let file = File::open(dest).with_path(dest)?;
            file.sync_all().with_path(dest)?;
        }

        let mut stats = CopyStats {
            bytes_copied,
            duration: start.elapsed(),
            throughput: 0.0,
        };
        stats.calculate_throughput();

        Ok(stats)
    }

    fn copy_buffered(&self, source: &Path, dest: &Path) -> Result<u64> {
        let src_file = File::open(source).with_path(source)?;
        Self::unlink_if_readonly(dest)?;
        let dst_file = File::create(dest).with_path(dest)?;

        let mut reader = BufReader::with_capacity(self.options.buffer_size, src_file);
        let mut writer = BufWriter::with_capacity(self.options.buffer_size, dst_file);

        let bytes = std::io::copy(&mut reader, &mut writer).with_path(dest)?;
        writer.flush().with_path(dest)?;

        Ok(bytes)
    }

    /// A read-only backup (from a read-only source) can't be truncated, so
    /// it is removed and recreated instead
    fn unlink_if_readonly(dest: &Path) -> Result<()> {
        match std::fs::symlink_metadata(dest) {
            Ok(meta) if meta.is_file() && meta.permissions().readonly() => {
                std::fs::remove_file(dest).with_path(dest)
            }
            _ => Ok(()),
        }
    }

    fn copy_permissions(&self, source: &Path, dest: &Path) -> Result<()> {
        let metadata = std::fs::metadata(source).with_path(source)?;
        std::fs::set_permissions(dest, metadata.permissions()).with_path(dest)?;
        Ok(())
    }

    fn copy_mtime(&self, source: &Path, dest: &Path) -> Result<()> {
        let metadata = std::fs::metadata(source).with_path(source)?;
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        let atime = filetime::FileTime::from_last_access_time(&metadata);
        filetime::set_file_times(dest, atime, mtime).with_path(dest)?;
        Ok(())
    }
}

impl Default for FileCopier {
    fn default() -> Self {
        Self::default_copier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, size: usize) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(&vec![0xABu8; size]).unwrap();
        path
    }

    #[test]
    fn test_copy_small_file() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let src = create_test_file(src_dir.path(), "test.txt", 1024);
        let dst = dst_dir.path().join("test.txt");

        let stats = FileCopier::default_copier().copy(&src, &dst).unwrap();

        assert_eq!(stats.bytes_copied, 1024);
        assert_eq!(std::fs::read(&src).unwrap(), std::fs::read(&dst).unwrap());
    }

    #[test]
    fn test_copy_empty_file() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let src = src_dir.path().join("empty.txt");
        File::create(&src).unwrap();
        let dst = dst_dir.path().join("empty.txt");

        let stats = FileCopier::default_copier().copy(&src, &dst).unwrap();

        assert_eq!(stats.bytes_copied, 0);
        assert!(dst.exists());
    }

    #[test]
    fn test_copy_overwrites_existing() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let src = create_test_file(src_dir.path(), "f.bin", 10);
        let dst = create_test_file(dst_dir.path(), "f.bin", 5000);

        FileCopier::default_copier().copy(&src, &dst).unwrap();

        assert_eq!(std::fs::metadata(&dst).unwrap().len(), 10);
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let src = create_test_file(src_dir.path(), "old.txt", 64);
        let past = filetime::FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&src, past).unwrap();

        let dst = dst_dir.path().join("old.txt");
        FileCopier::default_copier().copy(&src, &dst).unwrap();

        let meta = std::fs::metadata(&dst).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&meta), past);
    }

    #[test]
    fn test_copy_without_mtime_preservation() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let src = create_test_file(src_dir.path(), "old.txt", 64);
        let past = filetime::FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&src, past).unwrap();

        let copier = FileCopier::new(CopyOptions {
            preserve_mtime: false,
            ..Default::default()
        });
        let dst = dst_dir.path().join("old.txt");
        copier.copy(&src, &dst).unwrap();

        let meta = std::fs::metadata(&dst).unwrap();
        assert!(filetime::FileTime::from_last_modification_time(&meta) > past);
    }

    #[test]
    fn test_copy_missing_parent_fails() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let src = create_test_file(src_dir.path(), "test.txt", 100);
        let dst = dst_dir.path().join("missing/test.txt");

        let err = FileCopier::default_copier().copy(&src, &dst).unwrap_err();
        assert_eq!(err.path(), Some(&dst));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_replaces_readonly_backup() {
        use std::os::unix::fs::PermissionsExt;

        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let src = src_dir.path().join("ro.txt");
        let dst = dst_dir.path().join("ro.txt");
        let copier = FileCopier::default_copier();

        std::fs::write(&src, b"v1").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o444)).unwrap();
        copier.copy(&src, &dst).unwrap();
        assert!(std::fs::metadata(&dst).unwrap().permissions().readonly());

        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o644)).unwrap();
        std::fs::write(&src, b"version two").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o444)).unwrap();
        copier.copy(&src, &dst).unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), b"version two");
        assert_eq!(std::fs::metadata(&dst).unwrap().permissions().mode() & 0o777, 0o444);
    }
}
