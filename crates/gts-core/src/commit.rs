//! Commit records and their normalization.
//!
//! Commits arrive either from the log parser or as already-structured
//! [`RawCommit`] records (e.g. deserialized from JSON). Both paths go through
//! [`normalize`], which is the single place where date-like values are turned
//! into a canonical instant.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::FileTypeBuckets;
use crate::types::{CommitHash, short_hash};

/// Failure to turn a date-like value into a valid instant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("date is missing")]
    Missing,
    #[error("date string is empty")]
    Empty,
    #[error("unparsable date: {value:?}")]
    Unparsable { value: String },
    #[error("epoch value out of range: {value} ms")]
    OutOfRange { value: i64 },
}

/// A date as supplied by a commit source, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    /// Already a valid instant.
    Instant(DateTime<Utc>),
    /// Milliseconds since the Unix epoch.
    EpochMillis(i64),
    /// Any textual representation (ISO 8601, git `%ai`, RFC 2822, ...).
    Text(String),
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::EpochMillis(ms) => write!(f, "{ms}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<DateTime<Utc>> for DateValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Instant(dt)
    }
}

impl From<&str> for DateValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Text formats tried after RFC 3339, in order. All carry an explicit offset.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Offset-less date-time formats, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse and validate a date-like value into a UTC instant.
///
/// This is the only date ingestion point of the pipeline; the log parser and
/// [`normalize`] both call it.
pub fn parse_timestamp(value: &DateValue) -> Result<DateTime<Utc>, TimestampError> {
    match value {
        DateValue::Instant(dt) => Ok(*dt),
        DateValue::EpochMillis(ms) => Utc
            .timestamp_millis_opt(*ms)
            .single()
            .ok_or(TimestampError::OutOfRange { value: *ms }),
        DateValue::Text(s) => parse_timestamp_str(s),
    }
}

/// Parse a textual date.
///
/// Accepts RFC 3339, git's ISO-like `%ai` output (`2024-01-15 10:30:00 +0100`),
/// RFC 2822, offset-less date-times (taken as UTC) and bare dates (UTC midnight).
pub fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimestampError::Empty);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(TimestampError::Unparsable {
        value: s.to_string(),
    })
}

/// Per-file change counts from `git log --numstat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    #[serde(alias = "filePath")]
    pub path: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl FileStat {
    pub fn new(path: impl Into<String>, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
        }
    }

    /// Added plus deleted lines.
    pub const fn lines_changed(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }
}

/// An unvalidated commit record.
///
/// Field names follow the structured interface used by non-text commit
/// sources (`authorName`, `fileStats`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCommit {
    pub hash: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub date: Option<DateValue>,
    pub message: Option<String>,
    pub branches: Vec<String>,
    pub file_stats: Vec<FileStat>,
    pub diff: Option<String>,
    pub repo: Option<String>,
    pub repo_type: Option<String>,
}

/// A validated commit.
///
/// Created by [`normalize`]; the analyzer fills in `tickets`, `project` and
/// `file_types` without touching anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: CommitHash,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub branches: BTreeSet<String>,
    #[serde(default)]
    pub file_stats: Vec<FileStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_type: Option<String>,
    #[serde(default)]
    pub tickets: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_types: Option<FileTypeBuckets>,
}

impl Commit {
    /// First line of the commit message, trimmed.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn has_file_stats(&self) -> bool {
        !self.file_stats.is_empty()
    }
}

impl From<Commit> for RawCommit {
    fn from(commit: Commit) -> Self {
        Self {
            hash: Some(commit.hash.into()),
            author_name: Some(commit.author_name),
            author_email: Some(commit.author_email),
            date: Some(DateValue::Instant(commit.timestamp)),
            message: Some(commit.message),
            branches: commit.branches.into_iter().collect(),
            file_stats: commit.file_stats,
            diff: commit.diff,
            repo: commit.repo,
            repo_type: commit.repo_type,
        }
    }
}

/// Why a record could not be normalized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("record has no commit hash")]
    MissingHash,
    #[error("commit {hash}: invalid date {raw:?}: {source}")]
    InvalidTimestamp {
        /// Hash prefix of the offending commit.
        hash: String,
        /// The raw date value as supplied.
        raw: String,
        #[source]
        source: TimestampError,
    },
}

/// Coerce a raw record into a [`Commit`].
///
/// Fails when the hash is missing or the date cannot be resolved to a valid
/// instant. Missing optional text fields become empty strings.
pub fn normalize(raw: RawCommit) -> Result<Commit, NormalizeError> {
    let hash = raw
        .hash
        .ok_or(NormalizeError::MissingHash)
        .and_then(|h| CommitHash::new(h).map_err(|_| NormalizeError::MissingHash))?;

    let timestamp = match &raw.date {
        Some(value) => parse_timestamp(value),
        None => Err(TimestampError::Missing),
    }
    .map_err(|source| NormalizeError::InvalidTimestamp {
        hash: hash.short().to_string(),
        raw: raw.date.as_ref().map(ToString::to_string).unwrap_or_default(),
        source,
    })?;

    Ok(Commit {
        hash,
        author_name: raw.author_name.unwrap_or_default(),
        author_email: raw.author_email.unwrap_or_default(),
        timestamp,
        message: raw.message.unwrap_or_default(),
        branches: raw.branches.into_iter().collect(),
        file_stats: raw.file_stats,
        diff: raw.diff,
        repo: raw.repo,
        repo_type: raw.repo_type,
        tickets: BTreeSet::new(),
        project: None,
        file_types: None,
    })
}

/// Keep the first occurrence of each hash, preserving relative order.
pub fn deduplicate(commits: Vec<Commit>) -> Vec<Commit> {
    let mut seen: HashSet<CommitHash> = HashSet::with_capacity(commits.len());
    let mut unique = commits;
    unique.retain(|c| seen.insert(c.hash.clone()));
    unique
}

/// Return a copy of `commits` ordered newest first.
///
/// The sort is stable, so commits sharing a timestamp keep their input order.
pub fn sort_by_date(commits: &[Commit]) -> Vec<Commit> {
    let mut sorted = commits.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
}

/// Hash prefix for diagnostics on records that may lack a valid hash.
pub(crate) fn raw_hash_prefix(raw: &RawCommit) -> String {
    raw.hash
        .as_deref()
        .map(|h| short_hash(h.trim()).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn raw(hash: &str, date: DateValue) -> RawCommit {
        RawCommit {
            hash: Some(hash.to_string()),
            author_name: Some("Ada".to_string()),
            author_email: Some("ada@example.com".to_string()),
            date: Some(date),
            message: Some("Add parser".to_string()),
            ..RawCommit::default()
        }
    }

    fn commit(hash: &str, minutes: i64) -> Commit {
        normalize(raw(hash, DateValue::Instant(ts(minutes)))).unwrap()
    }

    #[test]
    fn parses_git_iso_format() {
        let dt = parse_timestamp_str("2025-01-15 10:00:00 +0100").unwrap();
        assert_eq!(dt, ts(0));
    }

    #[test]
    fn parses_rfc3339_and_rfc2822() {
        assert_eq!(parse_timestamp_str("2025-01-15T09:00:00Z").unwrap(), ts(0));
        assert_eq!(
            parse_timestamp_str("Wed, 15 Jan 2025 09:00:00 +0000").unwrap(),
            ts(0)
        );
    }

    #[test]
    fn offsetless_and_date_only_are_utc() {
        assert_eq!(parse_timestamp_str("2025-01-15T09:30:00").unwrap(), ts(30));
        assert_eq!(
            parse_timestamp_str("2025-01-15").unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn epoch_millis_are_accepted() {
        let ms = ts(0).timestamp_millis();
        assert_eq!(parse_timestamp(&DateValue::EpochMillis(ms)).unwrap(), ts(0));
        assert!(matches!(
            parse_timestamp(&DateValue::EpochMillis(i64::MAX)),
            Err(TimestampError::OutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_garbage_and_empty_dates() {
        assert_eq!(parse_timestamp_str("  "), Err(TimestampError::Empty));
        assert!(matches!(
            parse_timestamp_str("yesterday-ish"),
            Err(TimestampError::Unparsable { .. })
        ));
        assert!(matches!(
            parse_timestamp_str("2025-13-45 99:00:00 +0000"),
            Err(TimestampError::Unparsable { .. })
        ));
    }

    #[test]
    fn normalize_fills_defaults() {
        let record = RawCommit {
            hash: Some("abc1234".to_string()),
            date: Some(DateValue::from("2025-01-15T09:00:00Z")),
            ..RawCommit::default()
        };
        let c = normalize(record).unwrap();
        assert_eq!(c.author_name, "");
        assert_eq!(c.message, "");
        assert!(c.branches.is_empty());
        assert!(c.file_stats.is_empty());
        assert!(c.tickets.is_empty());
        assert_eq!(c.timestamp, ts(0));
    }

    #[test]
    fn normalize_rejects_missing_hash() {
        let mut record = raw("x", DateValue::Instant(ts(0)));
        record.hash = None;
        assert_eq!(normalize(record), Err(NormalizeError::MissingHash));

        let blank = raw("   ", DateValue::Instant(ts(0)));
        assert_eq!(normalize(blank), Err(NormalizeError::MissingHash));
    }

    #[test]
    fn normalize_reports_invalid_date_context() {
        let record = raw("0123456789abcdef", DateValue::from("not a date"));
        let err = normalize(record).unwrap_err();
        match err {
            NormalizeError::InvalidTimestamp { hash, raw, .. } => {
                assert_eq!(hash, "0123456");
                assert_eq!(raw, "not a date");
            }
            NormalizeError::MissingHash => panic!("expected timestamp error"),
        }

        let mut missing = raw("abcdef1", DateValue::Instant(ts(0)));
        missing.date = None;
        assert!(matches!(
            normalize(missing),
            Err(NormalizeError::InvalidTimestamp {
                source: TimestampError::Missing,
                ..
            })
        ));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut first = raw("abc1234", DateValue::from("2025-01-15 10:00:00 +0100"));
        first.branches = vec!["main".to_string(), "feature/x".to_string()];
        first.file_stats = vec![FileStat::new("src/lib.rs", 10, 2)];
        first.repo = Some("gts".to_string());

        let once = normalize(first).unwrap();
        let twice = normalize(RawCommit::from(once.clone())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn deduplicate_keeps_first_occurrence_in_order() {
        let mut later_dup = commit("b", 50);
        later_dup.message = "duplicate".to_string();
        let commits = vec![commit("a", 0), commit("b", 10), commit("c", 20), later_dup];

        let unique = deduplicate(commits);
        let hashes: Vec<_> = unique.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["a", "b", "c"]);
        assert_eq!(unique[1].message, "Add parser");

        let again = deduplicate(unique.clone());
        assert_eq!(again, unique);
    }

    #[test]
    fn sort_by_date_is_newest_first_and_non_mutating() {
        let commits = vec![commit("a", 10), commit("b", 30), commit("c", 20)];
        let before = commits.clone();

        let sorted = sort_by_date(&commits);
        let hashes: Vec<_> = sorted.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["b", "c", "a"]);
        assert!(sorted.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(commits, before);
    }

    #[test]
    fn raw_commit_deserializes_structured_records() {
        let json = r#"{
            "hash": "abc1234",
            "authorName": "Ada",
            "authorEmail": "ada@example.com",
            "date": 1736931600000,
            "message": "Fix bug",
            "branches": ["main"],
            "fileStats": [{"filePath": "src/a.rs", "additions": 3, "deletions": 1}],
            "repo": "gts",
            "repoType": "local"
        }"#;
        let record: RawCommit = serde_json::from_str(json).unwrap();
        assert_eq!(record.date, Some(DateValue::EpochMillis(1_736_931_600_000)));
        assert_eq!(record.file_stats[0].path, "src/a.rs");

        let c = normalize(record).unwrap();
        assert_eq!(c.timestamp, ts(0));
        assert_eq!(c.repo_type.as_deref(), Some("local"));
    }

    #[test]
    fn raw_commit_deserializes_text_dates() {
        let json = r#"{"hash": "abc1234", "date": "2025-01-15 10:00:00 +0100"}"#;
        let record: RawCommit = serde_json::from_str(json).unwrap();
        assert_eq!(normalize(record).unwrap().timestamp, ts(0));
    }
}
