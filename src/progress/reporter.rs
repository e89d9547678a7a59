//! Run summary reporting
//!
//! The engine produces one [`RunReport`] per run, printed once after
//! completion as text or JSON.

use crate::core::CountersSnapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Final report of a backup run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Commits that passed validation and were run
    pub commits_honoured: usize,
    /// Validation failures found while reading the job
    pub startup_errors: usize,
    /// Worker threads used
    pub threads: usize,
    /// Counter values at completion
    pub counters: CountersSnapshot,
    /// Wall-clock duration
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Did at least one commit run?
    pub fn is_success(&self) -> bool {
        self.commits_honoured > 0
    }

    /// Average copy throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counters.bytes_copied as f64 / secs
        } else {
            0.0
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        let c = &self.counters;
        println!("\n=== Backup Summary ===");
        if self.startup_errors > 0 {
            println!("Startup errors:  {}", self.startup_errors);
        }
        println!("Commits:         {}", self.commits_honoured);
        println!("Files copied:    {}", c.files_copied);
        println!("Files skipped:   {}", c.files_skipped);
        println!("Dirs excluded:   {}", c.dirs_excluded);
        println!("Files excluded:  {}", c.files_excluded);
        println!("Errors:          {}", c.errors);
        println!("Bytes copied:    {}", humansize::format_size(c.bytes_copied, humansize::BINARY));
        println!("Dirs created:    {}", c.dirs_created);
        if c.tasks_cancelled > 0 {
            println!("Cancelled tasks: {}", c.tasks_cancelled);
        }
        println!("Time:            {}", humantime::format_duration(round_millis(self.elapsed)));
        println!("Throughput:      {}/s", humansize::format_size(self.throughput() as u64, humansize::BINARY));
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn round_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
