//! Directory enumeration and attribute lookup
//!
//! The engine never touches `std::fs::read_dir` directly. It goes through a
//! [`DirectoryLister`], which returns the immediate children of a directory
//! with the attributes the skip check needs (size and modification time).

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Kind of a directory entry, after symlink resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (or symlink resolving to one)
    File,
    /// Directory
    Directory,
    /// Symlink pointing at a directory
    SymlinkDir,
    /// Anything else (sockets, fifos, dangling symlinks)
    Other,
}

/// Size and modification time of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileStat {
    /// Build from std metadata
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// One immediate child of a listed directory
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    /// File name (no parent component)
    pub name: OsString,
    /// Resolved kind
    pub kind: EntryKind,
    /// Size and mtime; zeroed for directories
    pub stat: FileStat,
}

impl DirEntryInfo {
    /// Is this a directory (symlinked or not)?
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory | EntryKind::SymlinkDir)
    }

    /// Is this the `.` or `..` pseudo-entry?
    pub fn is_pseudo(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Capability for enumerating directories and reading file attributes
pub trait DirectoryLister: Send + Sync {
    /// List the immediate children of `dir`
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;

    /// Stat a single file. `Ok(None)` means it does not exist.
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>>;
}

/// [`DirectoryLister`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl FsLister {
    /// Create a new lister
    pub fn new() -> Self {
        Self
    }

    fn entry_info(entry: &std::fs::DirEntry) -> io::Result<DirEntryInfo> {
        let file_type = entry.file_type()?;
        let name = entry.file_name();

        if file_type.is_symlink() {
            // Resolve the target; a dangling link is reported as Other.
            return Ok(match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_dir() => DirEntryInfo {
                    name,
                    kind: EntryKind::SymlinkDir,
                    stat: FileStat::from_metadata(&meta),
                },
                Ok(meta) if meta.is_file() => DirEntryInfo {
                    name,
                    kind: EntryKind::File,
                    stat: FileStat::from_metadata(&meta),
                },
                _ => DirEntryInfo {
                    name,
                    kind: EntryKind::Other,
                    stat: FileStat {
                        size: 0,
                        modified: SystemTime::UNIX_EPOCH,
                    },
                },
            });
        }

        let meta = entry.metadata()?;
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        Ok(DirEntryInfo {
            name,
            kind,
            stat: FileStat::from_metadata(&meta),
        })
    }
}

impl DirectoryLister for FsLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        Ok(collect_entries(dir, std::fs::read_dir(dir)?, |entry| {
            Self::entry_info(entry).map_err(|e| {
                // Entry vanished between readdir and stat
                tracing::debug!("Skipping {:?}: {}", entry.path(), e);
                e
            })
        }))
    }

    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Some(FileStat::from_metadata(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Keep every entry that could be read and described; the rest are dropped
/// without failing the listing
fn collect_entries<T>(
    dir: &Path,
    raw: impl IntoIterator<Item = io::Result<T>>,
    describe: impl Fn(&T) -> io::Result<DirEntryInfo>,
) -> Vec<DirEntryInfo> {
    let mut entries = Vec::new();
    for entry in raw {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if let Ok(info) = describe(&entry) {
            entries.push(info);
        }
    }
    entries
}
