//! Per-commit exclusion rules
//!
//! An [`ExclusionSet`] is assembled while a job file is read and frozen when
//! the commit directive is reached. From then on it is shared read-only
//! (behind an `Arc`) by every task spawned from that commit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Directory substrings and file extensions excluded from a backup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    /// Any directory whose full path contains one of these is skipped
    excluded_dir_substrings: BTreeSet<String>,
    /// Extensions, always stored with their leading dot
    excluded_extensions: BTreeSet<String>,
}

impl ExclusionSet {
    /// Create an empty exclusion set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory substring rule. Empty rules are ignored since they
    /// would match every path.
    pub fn exclude_dir(&mut self, substring: impl Into<String>) -> &mut Self {
        let substring = substring.into();
        if !substring.is_empty() {
            self.excluded_dir_substrings.insert(substring);
        }
        self
    }

    /// Add a file extension rule (`log` and `.log` are equivalent)
    pub fn exclude_extension(&mut self, extension: impl AsRef<str>) -> &mut Self {
        let ext = extension.as_ref().trim();
        if ext.is_empty() || ext == "." {
            return self;
        }
        let normalized = if ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{}", ext)
        };
        self.excluded_extensions.insert(normalized);
        self
    }

    /// Builder-style variant of [`exclude_dir`](Self::exclude_dir)
    pub fn with_dir(mut self, substring: impl Into<String>) -> Self {
        self.exclude_dir(substring);
        self
    }

    /// Builder-style variant of [`exclude_extension`](Self::exclude_extension)
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.exclude_extension(extension);
        self
    }

    /// True if any configured substring occurs in the candidate's textual path.
    /// Matching is case-sensitive.
    pub fn is_dir_excluded(&self, candidate: &Path) -> bool {
        if self.excluded_dir_substrings.is_empty() {
            return false;
        }
        let text = candidate.to_string_lossy();
        self.excluded_dir_substrings
            .iter()
            .any(|s| text.contains(s.as_str()))
    }

    /// True if `extension` (with leading dot, e.g. `.log`) matches a rule exactly
    pub fn is_file_excluded(&self, extension: &str) -> bool {
        !extension.is_empty() && self.excluded_extensions.contains(extension)
    }

    /// Convenience wrapper that derives the extension from a file path.
    /// Files without an extension are never excluded.
    pub fn is_path_excluded(&self, file: &Path) -> bool {
        match dotted_extension(file) {
            Some(ext) => self.is_file_excluded(&ext),
            None => false,
        }
    }

    /// Check if no rules are configured
    pub fn is_empty(&self) -> bool {
        self.excluded_dir_substrings.is_empty() && self.excluded_extensions.is_empty()
    }

    /// Configured directory substrings
    pub fn dir_substrings(&self) -> impl Iterator<Item = &str> {
        self.excluded_dir_substrings.iter().map(String::as_str)
    }

    /// Configured extensions, dotted
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.excluded_extensions.iter().map(String::as_str)
    }
}

/// Extension of `path` with its leading dot, e.g. `.txt`
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
}
