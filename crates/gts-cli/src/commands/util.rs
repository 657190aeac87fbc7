//! Shared utilities for CLI commands.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use gts_core::commit::parse_timestamp;
use gts_core::log_parser::GIT_PRETTY_FORMAT;
use gts_core::{GitSource, LogOptions, ParseOptions, RawCommit, collect_repositories, parse_log};
use regex::Regex;

use crate::cli::HistoryArgs;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as ISO 8601, a bare date, or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Date: "2026-01-15" (midnight UTC)
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z), a date (2026-01-15) or relative (e.g., '2 weeks ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Formats minutes as "Xh Ym" if >= 1 hour, "Ym" otherwise.
#[allow(
    clippy::cast_possible_truncation,
    reason = "estimates are bounded well below i64::MAX minutes"
)]
pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.round().max(0.0) as i64;
    let hours = total / 60;
    let minutes = total % 60;
    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Raw commit records plus the number of malformed log records skipped.
#[derive(Debug, Default)]
pub struct LoadedHistory {
    pub records: Vec<RawCommit>,
    pub dropped: usize,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Read commit records from `--input` or from the selected repositories.
pub fn load_history(history: &HistoryArgs, concurrency: usize) -> Result<LoadedHistory> {
    let since = history.since.as_deref().map(parse_datetime).transpose()?;
    let until = history.until.as_deref().map(parse_datetime).transpose()?;

    if let Some(input) = &history.input {
        let text = read_input(input)?;
        let parsed = parse_log(
            &text,
            ParseOptions {
                include_file_stats: history.file_stats,
                include_diff: false,
            },
        );
        for record in &parsed.malformed {
            tracing::warn!(error = %record, "skipping malformed log record");
        }
        let author = history
            .author
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("invalid --author pattern")?;
        let dropped = parsed.dropped();
        let records = filter_records(parsed.records, since, until, author.as_ref());
        return Ok(LoadedHistory {
            dropped,
            records,
            since,
            until,
        });
    }

    let options = LogOptions {
        since,
        until,
        author: history.author.clone(),
        revisions: history.branches.clone(),
        max_count: history.max_count,
        no_merges: history.no_merges,
        include_file_stats: history.file_stats,
        ..LogOptions::default()
    };
    let repos = if history.repos.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        history.repos.clone()
    };
    let sources: Vec<GitSource> = repos.into_iter().map(GitSource::new).collect();

    let mut collected = collect_repositories(&sources, &options, concurrency)?;
    if collected.repositories.is_empty() && !collected.failures.is_empty() {
        let failure = collected.failures.remove(0);
        return Err(failure.error).with_context(|| {
            format!("failed to read repository {}", failure.path.display())
        });
    }

    Ok(LoadedHistory {
        records: collected.records,
        dropped: collected.dropped,
        since,
        until,
    })
}

/// Applies `--since`, `--until` and `--author` to records that did not come
/// from `git log` itself. Bounds are inclusive; the author pattern is matched
/// against `Name <email>`. Records without a readable date are kept so the
/// generator can report them.
fn filter_records(
    records: Vec<RawCommit>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    author: Option<&Regex>,
) -> Vec<RawCommit> {
    let before = records.len();
    let kept: Vec<RawCommit> = records
        .into_iter()
        .filter(|record| {
            let when = record.date.as_ref().and_then(|d| parse_timestamp(d).ok());
            if let Some(when) = when {
                if since.is_some_and(|s| when < s) || until.is_some_and(|u| when > u) {
                    return false;
                }
            }
            author.is_none_or(|re| {
                let name = record.author_name.as_deref().unwrap_or_default();
                let email = record.author_email.as_deref().unwrap_or_default();
                re.is_match(&format!("{name} <{email}>"))
            })
        })
        .collect();
    if kept.len() < before {
        tracing::debug!(
            kept = kept.len(),
            skipped = before - kept.len(),
            "filtered input records"
        );
    }
    kept
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read log from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// The `git log` invocation whose output `--input` accepts.
pub fn log_command_hint() -> String {
    format!("git log --pretty='{GIT_PRETTY_FORMAT}' --decorate=full [--numstat]")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_datetime_iso() {
        let dt = parse_datetime_at("2025-01-10T08:30:00+01:00", now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 1, 10, 7, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_datetime_bare_date_is_midnight_utc() {
        let dt = parse_datetime_at("2025-01-10", now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_datetime_relative() {
        assert_eq!(
            parse_datetime_at("2 weeks ago", now()).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            parse_datetime_at("1 hour ago", now()).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 15, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime_at("last tuesday", now()).is_err());
        assert!(parse_datetime_at("999999999999 weeks ago", now()).is_err());
    }

    fn record(hash: &str, date: &str, author: &str) -> RawCommit {
        RawCommit {
            hash: Some(hash.to_string()),
            author_name: Some(author.to_string()),
            author_email: Some(format!("{}@example.com", author.to_lowercase())),
            date: Some(date.into()),
            ..RawCommit::default()
        }
    }

    fn hashes(records: &[RawCommit]) -> Vec<&str> {
        records.iter().filter_map(|r| r.hash.as_deref()).collect()
    }

    #[test]
    fn test_filter_records_by_window_and_author() {
        let records = vec![
            record("aaaaaaa", "2025-01-09T23:59:00Z", "Ada"),
            record("bbbbbbb", "2025-01-10T00:00:00Z", "Ada"),
            record("ccccccc", "2025-01-12T10:00:00Z", "Grace"),
            record("ddddddd", "2025-01-20T10:00:00Z", "Ada"),
            record("eeeeeee", "not a date", "Ada"),
        ];
        let since = Some(Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap());
        let until = Some(Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap());

        let windowed = filter_records(records.clone(), since, until, None);
        assert_eq!(hashes(&windowed), vec!["bbbbbbb", "ccccccc", "eeeeeee"]);

        let ada = Regex::new("ada@").unwrap();
        let by_ada = filter_records(records, since, until, Some(&ada));
        assert_eq!(hashes(&by_ada), vec!["bbbbbbb", "eeeeeee"]);
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0.0), "0m");
        assert_eq!(format_minutes(44.6), "45m");
        assert_eq!(format_minutes(60.0), "1h 0m");
        assert_eq!(format_minutes(125.2), "2h 5m");
        assert_eq!(format_minutes(-3.0), "0m");
    }
}
