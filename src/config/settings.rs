//! Configuration settings for TreeBackup
//!
//! Defines the CLI arguments and the runtime [`EngineConfig`] derived from
//! them.

use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default worker pool size
pub const DEFAULT_THREADS: usize = 8;

/// TreeBackup - concurrent incremental file-tree backup
#[derive(Parser, Debug, Clone)]
#[command(name = "treebackup")]
#[command(author = "TreeBackup Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror directory trees into a backup root, skipping files that are up to date")]
#[command(long_about = r#"
TreeBackup mirrors one or more source directories into a backup root using a
pool of worker threads. Files whose backup copy has the same size and is not
older than the source by more than the tolerance are skipped.

Job file format (one directive per line):
  v       Verbose mode
  =PATH   Set backup destination root
  +PATH   Add included source directory
  -TEXT   Exclude directories whose path contains TEXT
  !EXT    Exclude files with extension EXT (e.g. !.log)
  >       Commit the backup
  # ...   Comment

Examples:
  treebackup nightly.job
  treebackup nightly.job --threads 16 --stall-timeout 10m
  treebackup nightly.job -q --output-format json
"#)]
pub struct CliArgs {
    /// Job file describing what to back up
    #[arg(value_name = "JOB_FILE")]
    pub job_file: Option<PathBuf>,

    /// Number of worker threads (0 = one per CPU)
    #[arg(short = 't', long, default_value_t = DEFAULT_THREADS, value_name = "NUM", env = "TREEBACKUP_THREADS")]
    pub threads: usize,

    /// How much newer a source may be before it is re-copied (e.g. 3m, 90s)
    #[arg(long, default_value = "3m", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub tolerance: Duration,

    /// Upper bound on how long an idle worker sleeps before re-checking the queues
    #[arg(long, default_value = "50ms", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub idle_poll: Duration,

    /// Abort the run if pending work makes no progress for this long
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub stall_timeout: Option<Duration>,

    /// Buffer size for file copies (e.g., 1M, 64K)
    #[arg(short = 'b', long, default_value = "1M", value_name = "SIZE")]
    pub buffer_size: String,

    /// Do not carry source modification times over to the backup
    #[arg(long)]
    pub no_preserve_mtime: bool,

    /// Descend into symbolic links that point at directories
    #[arg(short = 'L', long)]
    pub follow_symlinks: bool,

    /// Append-only log of failed operations
    #[arg(long, default_value = "errors.log", value_name = "PATH")]
    pub error_log: PathBuf,

    /// Do not write an error log file
    #[arg(long, conflicts_with = "error_log")]
    pub no_error_log: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress the summary)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Output format for the run summary
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Runtime configuration of the backup engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker count (0 = auto-detect)
    pub threads: usize,
    /// Skip-check tolerance
    pub tolerance: Duration,
    /// Idle wait upper bound
    pub idle_poll: Duration,
    /// Stall detector, disabled when `None`
    pub stall_timeout: Option<Duration>,
    /// Copy buffer size in bytes
    pub buffer_size: usize,
    /// Preserve modification times on copies
    pub preserve_mtime: bool,
    /// Descend into symlinked directories
    pub follow_symlinks: bool,
    /// Error log path, `None` disables it
    pub error_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            tolerance: crate::sync::DEFAULT_TOLERANCE,
            idle_poll: Duration::from_millis(50),
            stall_timeout: None,
            buffer_size: 1024 * 1024, // 1MB
            preserve_mtime: true,
            follow_symlinks: false,
            error_log: None,
        }
    }
}

impl EngineConfig {
    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        let buffer_size = parse_size(&args.buffer_size)
            .map_err(|e| format!("Invalid buffer size: {}", e))?;
        if buffer_size == 0 {
            return Err("Buffer size must be greater than zero".to_string());
        }
        if args.idle_poll.is_zero() {
            return Err("Idle poll interval must be greater than zero".to_string());
        }

        Ok(Self {
            threads: args.threads,
            tolerance: args.tolerance,
            idle_poll: args.idle_poll,
            stall_timeout: args.stall_timeout,
            buffer_size: buffer_size as usize,
            preserve_mtime: !args.no_preserve_mtime,
            follow_symlinks: args.follow_symlinks,
            error_log: if args.no_error_log {
                None
            } else {
                Some(args.error_log.clone())
            },
        })
    }

    /// Worker count after auto-detection
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        let num = size.trim_end_matches(|c| c == 'G' || c == 'B');
        (num, 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        let num = size.trim_end_matches(|c| c == 'M' || c == 'B');
        (num, 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        let num = size.trim_end_matches(|c| c == 'K' || c == 'B');
        (num, 1024u64)
    } else if size.ends_with('B') {
        let num = size.trim_end_matches('B');
        (num, 1u64)
    } else {
        // Assume bytes if no suffix
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    Ok((num * multiplier as f64) as u64)
}
