//! Version-control backend used for data directory backups.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{ChronoError, Result};

const FALLBACK_USER_NAME: &str = "chrono-task";
const FALLBACK_USER_EMAIL: &str = "chrono-task@localhost";

const IGNORE_FILE: &str = ".gitignore";

/// Kept out of backups: the log directory and temp files of in-progress saves.
const IGNORED_PATTERNS: [&str; 2] = ["/logs/", ".*.tmp"];

/// Result of [`VersionControlBackend::commit_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit with this message was created.
    Committed(String),
    /// The working tree had no changes.
    NothingToCommit,
}

/// Snapshot a directory into a repository.
///
/// Implementations are synchronous; async callers run them on the blocking
/// pool.
pub trait VersionControlBackend: Send + Sync {
    /// Whether the tool is installed.
    fn is_available(&self) -> bool;

    /// Initialize a repository in `dir` if there is none yet. Logs and
    /// temp files in `dir` are excluded from later commits.
    fn ensure_repository(&self, dir: &Path) -> Result<()>;

    /// Stage every change in `dir` that is not excluded and commit it with
    /// `message`.
    fn commit_all(&self, dir: &Path, message: &str) -> Result<CommitOutcome>;

    /// Message of the newest commit, `None` for a repository without commits.
    fn last_commit_message(&self, dir: &Path) -> Result<Option<String>>;
}

/// `git` found on `PATH`.
#[derive(Debug, Clone)]
pub struct GitBackend {
    program: Option<PathBuf>,
}

impl Default for GitBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GitBackend {
    pub fn new() -> Self {
        Self {
            program: which::which("git").ok(),
        }
    }

    /// Backend running a specific git binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn program(&self) -> Result<&Path> {
        self.program
            .as_deref()
            .ok_or_else(|| ChronoError::BackendUnavailable("git is not installed".to_owned()))
    }

    fn output(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        Command::new(self.program()?)
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| ChronoError::Backup(format!("cannot run git {args:?}: {e}")))
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let out = self.output(dir, args)?;
        if !out.status.success() {
            return Err(ChronoError::Backup(format!(
                "git {args:?} failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_owned())
    }

    fn succeeds(&self, dir: &Path, args: &[&str]) -> Result<bool> {
        Ok(self.output(dir, args)?.status.success())
    }

    /// Give the repository a local identity when none is configured, so
    /// commits work on machines without a global git config.
    fn ensure_identity(&self, dir: &Path) -> Result<()> {
        if !self.succeeds(dir, &["config", "user.name"])? {
            self.run(dir, &["config", "user.name", FALLBACK_USER_NAME])?;
        }
        if !self.succeeds(dir, &["config", "user.email"])? {
            self.run(dir, &["config", "user.email", FALLBACK_USER_EMAIL])?;
        }
        Ok(())
    }

    /// Append the missing [`IGNORED_PATTERNS`] to `dir/.gitignore`.
    fn ensure_ignores(dir: &Path) -> Result<()> {
        let path = dir.join(IGNORE_FILE);
        let mut contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let missing: Vec<&str> = IGNORED_PATTERNS
            .into_iter()
            .filter(|pattern| !contents.lines().any(|line| line.trim() == *pattern))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        for pattern in missing {
            contents.push_str(pattern);
            contents.push('\n');
        }
        std::fs::write(&path, contents)?;
        Ok(())
    }
}

impl VersionControlBackend for GitBackend {
    fn is_available(&self) -> bool {
        self.program.as_deref().is_some_and(|program| {
            Command::new(program)
                .arg("--version")
                .output()
                .is_ok_and(|out| out.status.success())
        })
    }

    fn ensure_repository(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        if !dir.join(".git").exists() {
            self.run(dir, &["init"])?;
            tracing::info!("initialized backup repository in {}", dir.display());
        }
        Self::ensure_ignores(dir)?;
        self.ensure_identity(dir)
    }

    fn commit_all(&self, dir: &Path, message: &str) -> Result<CommitOutcome> {
        let status = self.run(dir, &["status", "--porcelain"])?;
        if status.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }

        self.run(dir, &["add", "-A"])?;
        self.run(dir, &["commit", "-m", message])?;
        Ok(CommitOutcome::Committed(message.to_owned()))
    }

    fn last_commit_message(&self, dir: &Path) -> Result<Option<String>> {
        if !self.succeeds(dir, &["rev-parse", "--verify", "--quiet", "HEAD"])? {
            return Ok(None);
        }
        self.run(dir, &["log", "-1", "--pretty=%B"]).map(Some)
    }
}
