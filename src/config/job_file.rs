//! Job file parsing
//!
//! A job file is a list of one-character directives:
//!
//! ```text
//! # nightly backup
//! v
//! =/mnt/backup
//! +/home/alice/projects
//! -node_modules
//! !.log
//! >
//! ```
//!
//! Includes and exclusions accumulate until a `>` line commits them. Each
//! commit is validated against the filesystem when it is reached; a commit
//! referencing a missing path is kept in the plan with its issues but is
//! never run. The destination root persists across commits.

use crate::error::{BackupError, IoResultExt, Result};
use crate::fs::ExclusionSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One committed group of include/exclude directives
#[derive(Debug)]
pub struct Commit {
    /// Line number (1-based) of the `>` directive
    pub line: usize,
    /// Backup destination root in effect at the commit
    pub dest_root: Option<PathBuf>,
    /// Source directories to mirror
    pub included_dirs: Vec<PathBuf>,
    /// Exclusion rules shared by every task of this commit
    pub exclusions: Arc<ExclusionSet>,
    /// Startup validation failures; any issue disables the commit
    pub issues: Vec<BackupError>,
}

impl Commit {
    /// Build a commit outside of a job file, validating its paths now
    pub fn new(dest_root: impl Into<PathBuf>, included_dirs: Vec<PathBuf>, exclusions: ExclusionSet) -> Self {
        Self::validated(0, Some(dest_root.into()), included_dirs, exclusions)
    }

    fn validated(
        line: usize,
        dest_root: Option<PathBuf>,
        included_dirs: Vec<PathBuf>,
        exclusions: ExclusionSet,
    ) -> Self {
        let mut issues = Vec::new();
        match &dest_root {
            Some(root) if !root.exists() => {
                tracing::error!("Backup destination doesn't exist: {}", root.display());
                issues.push(BackupError::NotFound(root.clone()));
            }
            Some(_) => {}
            None => {
                tracing::error!("Job file line {}: commit without a backup destination", line);
                issues.push(BackupError::job_file(line, "commit without a backup destination"));
            }
        }
        for dir in &included_dirs {
            if !dir.exists() {
                tracing::error!("Backup source doesn't exist: {}", dir.display());
                issues.push(BackupError::NotFound(dir.clone()));
            }
        }

        Self {
            line,
            dest_root,
            included_dirs,
            exclusions: Arc::new(exclusions),
            issues,
        }
    }

    /// Can this commit be run?
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty() && self.dest_root.is_some()
    }
}

/// Parsed job file
#[derive(Debug, Default)]
pub struct JobPlan {
    /// `v` directive seen
    pub verbose: bool,
    /// Commits in file order, valid or not
    pub commits: Vec<Commit>,
}

impl JobPlan {
    /// Read and validate a job file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_path(path)?;
        Self::parse(BufReader::new(file)).map_err(|e| match e {
            BackupError::Io { source, .. } => BackupError::io(path, source),
            other => other,
        })
    }

    /// Plan made of already-built commits
    pub fn from_commits(commits: Vec<Commit>) -> Self {
        Self {
            verbose: false,
            commits,
        }
    }

    /// Parse job directives from any reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut parser = Parser::default();
        for (idx, line) in reader.lines().enumerate() {
            parser.directive(idx + 1, &line?);
        }
        Ok(parser.finish())
    }

    /// Parse job directives from a string
    pub fn parse_str(text: &str) -> Self {
        let mut parser = Parser::default();
        for (idx, line) in text.lines().enumerate() {
            parser.directive(idx + 1, line);
        }
        parser.finish()
    }

    /// Commits that passed validation
    pub fn valid_commits(&self) -> impl Iterator<Item = &Commit> {
        self.commits.iter().filter(|c| c.is_valid())
    }

    /// Number of commits that will run
    pub fn honoured_commits(&self) -> usize {
        self.valid_commits().count()
    }

    /// Total validation failures across all commits
    pub fn startup_errors(&self) -> usize {
        self.commits.iter().map(|c| c.issues.len()).sum()
    }
}

#[derive(Default)]
struct Parser {
    plan: JobPlan,
    dest_root: Option<PathBuf>,
    included: Vec<PathBuf>,
    exclusions: ExclusionSet,
    uncommitted_line: Option<usize>,
}

impl Parser {
    fn directive(&mut self, line_no: usize, line: &str) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut chars = line.chars();
        let Some(op) = chars.next() else {
            return;
        };
        let arg = chars.as_str();

        match op {
            '#' => {}
            'v' => self.plan.verbose = true,
            '=' => self.dest_root = Some(PathBuf::from(arg)),
            '+' => {
                self.included.push(PathBuf::from(arg));
                self.uncommitted_line.get_or_insert(line_no);
            }
            '-' => {
                self.exclusions.exclude_dir(arg);
                self.uncommitted_line.get_or_insert(line_no);
            }
            '!' => {
                self.exclusions.exclude_extension(arg);
                self.uncommitted_line.get_or_insert(line_no);
            }
            '>' => self.commit(line_no),
            _ => {
                tracing::warn!("Job file line {}: unknown directive {:?} ignored", line_no, line);
            }
        }
    }

    fn commit(&mut self, line_no: usize) {
        let included = std::mem::take(&mut self.included);
        let exclusions = std::mem::take(&mut self.exclusions);
        self.uncommitted_line = None;

        if included.is_empty() {
            tracing::warn!("Job file line {}: commit has no included directories", line_no);
        }

        let commit = Commit::validated(line_no, self.dest_root.clone(), included, exclusions);
        self.plan.commits.push(commit);
    }

    fn finish(self) -> JobPlan {
        if let Some(line) = self.uncommitted_line {
            tracing::warn!(
                "Job file: directives from line {} onwards were never committed (missing '>')",
                line
            );
        }
        self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        dest: PathBuf,
        src_a: PathBuf,
        src_b: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("backup");
        let src_a = dir.path().join("a");
        let src_b = dir.path().join("b");
        for p in [&dest, &src_a, &src_b] {
            std::fs::create_dir_all(p).unwrap();
        }
        Fixture {
            _dir: dir,
            dest,
            src_a,
            src_b,
        }
    }

    #[test]
    fn test_parse_full_job() {
        let fx = fixture();
        let text = format!(
            "# nightly\nv\n={}\n+{}\n-cache\n!log\n>\n",
            fx.dest.display(),
            fx.src_a.display()
        );

        let plan = JobPlan::parse_str(&text);

        assert!(plan.verbose);
        assert_eq!(plan.commits.len(), 1);
        let commit = &plan.commits[0];
        assert!(commit.is_valid());
        assert_eq!(commit.line, 7);
        assert_eq!(commit.dest_root.as_deref(), Some(fx.dest.as_path()));
        assert_eq!(commit.included_dirs, vec![fx.src_a.clone()]);
        assert_eq!(commit.exclusions.dir_substrings().collect::<Vec<_>>(), vec!["cache"]);
        assert!(commit.exclusions.is_file_excluded(".log"));
        assert_eq!(plan.startup_errors(), 0);
    }

    #[test]
    fn test_each_commit_starts_fresh() {
        let fx = fixture();
        let text = format!(
            "={}\n+{}\n!.tmp\n>\n+{}\n>\n",
            fx.dest.display(),
            fx.src_a.display(),
            fx.src_b.display()
        );

        let plan = JobPlan::parse_str(&text);

        assert_eq!(plan.honoured_commits(), 2);
        assert_eq!(plan.commits[1].included_dirs, vec![fx.src_b.clone()]);
        assert!(plan.commits[1].exclusions.is_empty());
        // Destination persists
        assert_eq!(plan.commits[1].dest_root.as_deref(), Some(fx.dest.as_path()));
    }

    #[test]
    fn test_missing_source_disables_only_that_commit() {
        let fx = fixture();
        let missing = fx.src_a.join("nope");
        let text = format!(
            "={}\n+{}\n>\n+{}\n>\n",
            fx.dest.display(),
            missing.display(),
            fx.src_b.display()
        );

        let plan = JobPlan::parse_str(&text);

        assert_eq!(plan.commits.len(), 2);
        assert!(!plan.commits[0].is_valid());
        assert!(plan.commits[1].is_valid());
        assert_eq!(plan.startup_errors(), 1);
        assert_eq!(plan.honoured_commits(), 1);
        assert!(matches!(&plan.commits[0].issues[0], BackupError::NotFound(p) if *p == missing));
    }

    #[test]
    fn test_missing_destination_is_a_startup_error() {
        let fx = fixture();
        let text = format!("={}\n+{}\n>\n", fx.dest.join("gone").display(), fx.src_a.display());

        let plan = JobPlan::parse_str(&text);
        assert_eq!(plan.honoured_commits(), 0);
        assert_eq!(plan.startup_errors(), 1);
    }

    #[test]
    fn test_commit_without_destination() {
        let fx = fixture();
        let plan = JobPlan::parse_str(&format!("+{}\n>\n", fx.src_a.display()));

        assert_eq!(plan.honoured_commits(), 0);
        assert!(matches!(plan.commits[0].issues[0], BackupError::JobFile { line: 2, .. }));
    }

    #[test]
    fn test_excluded_dirs_are_not_validated() {
        let fx = fixture();
        let text = format!(
            "={}\n+{}\n-does/not/exist\n>\n",
            fx.dest.display(),
            fx.src_a.display()
        );
        assert_eq!(JobPlan::parse_str(&text).honoured_commits(), 1);
    }

    #[test]
    fn test_ignores_blank_comment_unknown_and_crlf() {
        let fx = fixture();
        let text = format!(
            "\r\n# comment\r\n?what\r\n={}\r\n+{}\r\n>\r\n",
            fx.dest.display(),
            fx.src_a.display()
        );

        let plan = JobPlan::parse_str(&text);
        assert!(!plan.verbose);
        assert_eq!(plan.honoured_commits(), 1);
        assert_eq!(plan.commits[0].included_dirs, vec![fx.src_a.clone()]);
    }

    #[test]
    fn test_no_commit_directive() {
        let fx = fixture();
        let plan = JobPlan::parse_str(&format!("={}\n+{}\n", fx.dest.display(), fx.src_a.display()));
        assert!(plan.commits.is_empty());
        assert_eq!(plan.honoured_commits(), 0);
    }

    #[test]
    fn test_programmatic_commit() {
        let fx = fixture();
        let ok = Commit::new(&fx.dest, vec![fx.src_a.clone()], ExclusionSet::new());
        let bad = Commit::new(fx.dest.join("gone"), vec![fx.src_b.clone()], ExclusionSet::new());

        let plan = JobPlan::from_commits(vec![ok, bad]);
        assert_eq!(plan.honoured_commits(), 1);
        assert_eq!(plan.startup_errors(), 1);
    }

    #[test]
    fn test_from_file() {
        let fx = fixture();
        let job = fx.dest.parent().unwrap().join("job.txt");
        std::fs::write(&job, format!("={}\n+{}\n>\n", fx.dest.display(), fx.src_a.display())).unwrap();

        let plan = JobPlan::from_file(&job).unwrap();
        assert_eq!(plan.honoured_commits(), 1);

        let err = JobPlan::from_file(fx.dest.join("missing.job")).unwrap_err();
        assert_eq!(err.path(), Some(&fx.dest.join("missing.job")));
    }
}
