//! Reading commit history from a local git repository.
//!
//! All operations shell out to `git -C <repo>` via `std::process::Command`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::log_parser::{GIT_PRETTY_FORMAT, ParseOptions, ParsedLog, parse_log};

/// Repository type tag attached to commits read through [`GitSource`].
pub const LOCAL_REPO_TYPE: &str = "local";

/// Errors reaching a commit source. These are fatal for the source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to run {git}: {source}")]
    Spawn {
        git: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a git repository: {stderr}")]
    NotARepository { path: PathBuf, stderr: String },

    #[error("git log failed in {path} (exit {status}): {stderr}")]
    LogFailed {
        path: PathBuf,
        status: String,
        stderr: String,
    },
}

/// Filters and capture switches for `git log`.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub committer: Option<String>,
    pub grep: Option<String>,
    /// Revisions or branch names to walk instead of `HEAD`.
    pub revisions: Vec<String>,
    /// Limit history to these paths.
    pub paths: Vec<PathBuf>,
    pub max_count: Option<usize>,
    pub skip: Option<usize>,
    pub no_merges: bool,
    pub first_parent: bool,
    /// Collect per-file line counts (`--numstat`).
    pub include_file_stats: bool,
    /// Collect the full patch (`--patch`).
    pub include_diff: bool,
}

impl LogOptions {
    pub const fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            include_file_stats: self.include_file_stats,
            include_diff: self.include_diff,
        }
    }

    /// Arguments following `git -C <repo>`.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "log".into(),
            format!("--pretty={GIT_PRETTY_FORMAT}").into(),
            "--decorate=full".into(),
        ];
        if self.include_file_stats {
            args.push("--numstat".into());
        }
        if self.include_diff {
            args.push("--patch".into());
        }
        if let Some(since) = self.since {
            args.push(format!("--since={}", since.to_rfc3339_opts(SecondsFormat::Secs, true)).into());
        }
        if let Some(until) = self.until {
            args.push(format!("--until={}", until.to_rfc3339_opts(SecondsFormat::Secs, true)).into());
        }
        if let Some(author) = &self.author {
            args.push(format!("--author={author}").into());
        }
        if let Some(committer) = &self.committer {
            args.push(format!("--committer={committer}").into());
        }
        if let Some(grep) = &self.grep {
            args.push(format!("--grep={grep}").into());
        }
        if let Some(n) = self.max_count.filter(|&n| n > 0) {
            args.push(format!("--max-count={n}").into());
        }
        if let Some(n) = self.skip {
            args.push(format!("--skip={n}").into());
        }
        if self.no_merges {
            args.push("--no-merges".into());
        }
        if self.first_parent {
            args.push("--first-parent".into());
        }
        args.extend(self.revisions.iter().map(OsString::from));
        if !self.paths.is_empty() {
            args.push("--".into());
            args.extend(self.paths.iter().map(|p| p.as_os_str().to_owned()));
        }
        args
    }
}

/// Identity of a repository, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoInfo {
    pub name: String,
    pub path: PathBuf,
    pub remote_url: Option<String>,
    pub repo_type: &'static str,
}

/// A local git repository used as a commit source.
#[derive(Debug, Clone)]
pub struct GitSource {
    path: PathBuf,
    git: PathBuf,
}

impl GitSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            git: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable instead of `git` from `PATH`.
    #[must_use]
    pub fn with_git_executable(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn output<I, S>(&self, args: I) -> Result<Output, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Command::new(&self.git)
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()
            .map_err(|source| SourceError::Spawn {
                git: self.git.clone(),
                source,
            })
    }

    /// Check that the path is inside a git work tree.
    pub fn verify(&self) -> Result<(), SourceError> {
        let output = self.output(["rev-parse", "--is-inside-work-tree"])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || stdout.trim() != "true" {
            return Err(SourceError::NotARepository {
                path: self.path.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Run `git log` and return its raw output.
    pub fn read_log(&self, options: &LogOptions) -> Result<String, SourceError> {
        let output = self.output(options.to_args())?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(SourceError::LogFailed {
                path: self.path.clone(),
                status: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: stderr.trim().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            tracing::warn!(path = ?self.path, stderr = %stderr.trim(), "git log wrote to stderr");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Verify the repository, read its log and decode it.
    pub fn fetch(&self, options: &LogOptions) -> Result<ParsedLog, SourceError> {
        self.verify()?;
        let text = self.read_log(options)?;
        let parsed = parse_log(&text, options.parse_options());
        tracing::debug!(
            path = ?self.path,
            records = parsed.records.len(),
            dropped = parsed.dropped(),
            "fetched commits"
        );
        Ok(parsed)
    }

    /// Name, location and remote of the repository.
    pub fn repo_info(&self) -> Result<RepoInfo, SourceError> {
        self.verify()?;
        let toplevel = self.output(["rev-parse", "--show-toplevel"])?;
        let path = if toplevel.status.success() {
            PathBuf::from(String::from_utf8_lossy(&toplevel.stdout).trim())
        } else {
            self.path.clone()
        };
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        let remote = self.output(["config", "--get", "remote.origin.url"])?;
        let remote_url = remote
            .status
            .success()
            .then(|| String::from_utf8_lossy(&remote.stdout).trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(RepoInfo {
            name,
            path,
            remote_url,
            repo_type: LOCAL_REPO_TYPE,
        })
    }
}
