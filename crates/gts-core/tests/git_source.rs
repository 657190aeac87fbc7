//! Reading history from real repositories. Skipped when `git` is unavailable.

use std::path::Path;
use std::process::Command;

use gts_core::{
    DEFAULT_CONCURRENCY, GenerateOptions, GitSource, LogOptions, SourceError, TimesheetConfig,
    TimesheetGenerator, collect_repositories,
};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str], date: &str) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Ada Lovelace", "-c", "user.email=ada@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_DATE", date)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// A repository with three commits on Wednesday 2025-01-15.
fn fixture_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let path = dir.path();
    git(path, &["init", "--quiet", "--initial-branch=main"], "2025-01-15T09:00:00Z");

    let commits = [
        ("src/app/main.rs", "fn main() {}\n", "PROJ-1 add entry point", "2025-01-15T09:00:00Z"),
        ("src/app/lib.rs", "pub fn f() {}\n", "PROJ-1 add library", "2025-01-15T09:20:00Z"),
        ("README.md", "# Demo\n", "Write readme\n\nWith a body paragraph.", "2025-01-15T14:00:00Z"),
    ];
    for (file, contents, message, date) in commits {
        let full = path.join(file);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, contents).unwrap();
        git(path, &["add", "."], date);
        git(path, &["commit", "--quiet", "-m", message], date);
    }
    dir
}

#[test]
fn reads_commits_from_repository() {
    if !git_available() {
        return;
    }
    let repo = fixture_repo();
    let source = GitSource::new(repo.path());
    let parsed = source.fetch(&LogOptions::default()).unwrap();

    assert_eq!(parsed.dropped(), 0);
    assert_eq!(parsed.records.len(), 3);
    let newest = &parsed.records[0];
    assert_eq!(newest.author_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(newest.message.as_deref(), Some("Write readme\n\nWith a body paragraph."));
    assert_eq!(newest.branches, vec!["main".to_string()]);
}

#[test]
fn file_stats_are_collected() {
    if !git_available() {
        return;
    }
    let repo = fixture_repo();
    let options = LogOptions {
        include_file_stats: true,
        ..LogOptions::default()
    };
    let parsed = GitSource::new(repo.path()).fetch(&options).unwrap();

    let oldest = parsed.records.last().unwrap();
    assert_eq!(oldest.message.as_deref(), Some("PROJ-1 add entry point"));
    assert_eq!(oldest.file_stats.len(), 1);
    assert_eq!(oldest.file_stats[0].path, "src/app/main.rs");
    assert_eq!(oldest.file_stats[0].additions, 1);
}

#[test]
fn repository_to_timesheet() {
    if !git_available() {
        return;
    }
    let repo = fixture_repo();
    let collected = collect_repositories(
        &[GitSource::new(repo.path())],
        &LogOptions::default(),
        DEFAULT_CONCURRENCY,
    )
    .unwrap();
    assert!(collected.failures.is_empty());
    assert_eq!(collected.repositories.len(), 1);

    let sheet = TimesheetGenerator::new(TimesheetConfig::default())
        .unwrap()
        .generate(collected.records, &GenerateOptions::default())
        .unwrap();
    assert_eq!(sheet.total_commits, 3);
    assert_eq!(sheet.total_sessions, 2);
    assert_eq!(sheet.repositories.repo_type.as_deref(), Some("local"));
    assert_eq!(sheet.by_ticket.get("PROJ-1"), Some(&2));
}

#[test]
fn plain_directory_is_not_a_repository() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let err = GitSource::new(dir.path()).verify().unwrap_err();
    assert!(matches!(err, SourceError::NotARepository { .. }));
}
