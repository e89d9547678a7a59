//! Incremental skip policy
//!
//! Decides from size and modification time alone whether a destination file
//! is current. Only a source that is newer by more than the tolerance, or a
//! size difference, forces a copy; a destination newer than its source is
//! left alone.

use crate::fs::FileStat;
use std::time::{Duration, SystemTime};

/// Default forward-in-time tolerance
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(180);

/// Why a file is being copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    /// No file at the destination path
    DestinationMissing,
    /// The subtree's destination was created during this run
    ChecksDisabled,
    /// Source modified more than the tolerance after the destination
    SourceNewer,
    /// Sizes differ
    SizeMismatch,
}

/// Outcome of a skip check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDecision {
    /// Copy the file
    Copy(CopyReason),
    /// Destination is current
    Skip,
}

impl CopyDecision {
    /// Should the file be copied?
    pub fn should_copy(&self) -> bool {
        matches!(self, Self::Copy(_))
    }
}

/// Size/mtime comparison with an asymmetric tolerance window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPolicy {
    tolerance: Duration,
}

impl SkipPolicy {
    /// Create a policy with the given tolerance
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Tolerance in use
    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Decide whether `source` must be copied over `dest`
    pub fn decide(&self, source: &FileStat, dest: Option<&FileStat>, skip_checks_enabled: bool) -> CopyDecision {
        let Some(dest) = dest else {
            return CopyDecision::Copy(CopyReason::DestinationMissing);
        };

        if !skip_checks_enabled {
            return CopyDecision::Copy(CopyReason::ChecksDisabled);
        }

        let delta = signed_seconds_between(source.modified, dest.modified);
        if delta > self.tolerance.as_secs() as i64 {
            return CopyDecision::Copy(CopyReason::SourceNewer);
        }

        if source.size != dest.size {
            return CopyDecision::Copy(CopyReason::SizeMismatch);
        }

        CopyDecision::Skip
    }
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

/// `later - earlier` in whole seconds, truncated toward zero
fn signed_seconds_between(later: SystemTime, earlier: SystemTime) -> i64 {
    match later.duration_since(earlier) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
