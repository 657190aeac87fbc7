//! Decoder for the sentinel-separated text produced by `git log`.
//!
//! # Record layout
//!
//! ```text
//! ---COMMIT-END---
//! <hash>[ (<ref decoration>)]
//! <author name>
//! <author email>
//! <date>
//! <message body...>
//!
//! <adds> <dels> <path>      (only with file stats)
//! diff --git ...            (only with diffs)
//! ```
//!
//! The sentinel may sit before or after each record; any line consisting of
//! the sentinel alone separates records.
//!
//! Header fields are validated by content, not position: blank lines are
//! skipped, the first field must look like a hash and the fourth like a date.
//! The first candidate that fails validation drops the whole record. Dropped
//! records are never fatal; they are reported in [`ParsedLog::malformed`].
//!
//! With file stats enabled the message ends at the first blank line after the
//! date. A multi-paragraph message therefore loses its stat block: the second
//! paragraph does not match the stat pattern and stat parsing stops there.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::commit::{DateValue, FileStat, RawCommit, TimestampError, parse_timestamp_str};
use crate::types::short_hash;

/// Line separating commit records.
pub const RECORD_SENTINEL: &str = "---COMMIT-END---";

/// `git log --pretty` format matching this parser.
pub const GIT_PRETTY_FORMAT: &str = "format:---COMMIT-END---%n%H%d%n%an%n%ae%n%ai%n%B";

const DIFF_MARKER: &str = "diff --git";

/// Maximum characters of an offending line kept in diagnostics.
const SNIPPET_LEN: usize = 50;

static HASH_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-fA-F]{7,40})(?:\s+\((.*)\))?$").unwrap());

static DATE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}").unwrap());

static STAT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+|-)\s+(\d+|-)\s+(.+)$").unwrap());

/// What the log text was generated with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// The log contains `--numstat` blocks.
    pub include_file_stats: bool,
    /// The log contains `--patch` output.
    pub include_diff: bool,
}

/// A record that could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("record {index}: first field is not a commit hash: {line:?}")]
    InvalidHash { index: usize, line: String },

    #[error("record {index} ({hash}): date field does not look like a date: {line:?}")]
    InvalidDate {
        index: usize,
        hash: String,
        line: String,
    },

    #[error("record {index}: only {found} of 4 header fields present")]
    TooFewFields { index: usize, found: usize },

    #[error("record {index} ({hash}): unparsable date {value:?}: {source}")]
    UnparsableDate {
        index: usize,
        hash: String,
        value: String,
        #[source]
        source: TimestampError,
    },
}

/// Result of decoding a log.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    /// Successfully decoded records, in log order.
    pub records: Vec<RawCommit>,
    /// Dropped records with the reason each was dropped.
    pub malformed: Vec<MalformedRecord>,
}

impl ParsedLog {
    /// Number of records dropped as malformed.
    pub fn dropped(&self) -> usize {
        self.malformed.len()
    }
}

/// Decode a sentinel-separated log into raw commit records.
pub fn parse_log(text: &str, options: ParseOptions) -> ParsedLog {
    let mut parsed = ParsedLog::default();

    for (index, chunk) in split_records(text).into_iter().enumerate() {
        match parse_record(index, &chunk, options) {
            Ok(record) => parsed.records.push(record),
            Err(reason) => {
                tracing::debug!(error = %reason, "dropping malformed commit record");
                parsed.malformed.push(reason);
            }
        }
    }

    tracing::debug!(
        records = parsed.records.len(),
        dropped = parsed.dropped(),
        "parsed commit log"
    );
    parsed
}

/// Split on sentinel lines, discarding chunks that are only whitespace.
fn split_records(text: &str) -> Vec<Vec<&str>> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim() == RECORD_SENTINEL {
            if current.iter().any(|l| !l.trim().is_empty()) {
                chunks.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if current.iter().any(|l| !l.trim().is_empty()) {
        chunks.push(current);
    }
    chunks
}

fn snippet(line: &str) -> String {
    line.chars().take(SNIPPET_LEN).collect()
}

struct Header<'a> {
    hash: &'a str,
    decoration: Option<&'a str>,
    author_name: &'a str,
    author_email: &'a str,
    date: &'a str,
    /// Index of the first line after the date.
    body_start: usize,
}

fn parse_header<'a>(index: usize, lines: &[&'a str]) -> Result<Header<'a>, MalformedRecord> {
    let mut fields: Vec<&'a str> = Vec::with_capacity(4);
    let mut decoration = None;
    let mut body_start = lines.len();

    for (i, &line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match fields.len() {
            0 => {
                let caps = HASH_LINE_RE
                    .captures(trimmed)
                    .ok_or_else(|| MalformedRecord::InvalidHash {
                        index,
                        line: snippet(trimmed),
                    })?;
                decoration = caps.get(2).map(|m| m.as_str());
                fields.push(caps.get(1).map_or(trimmed, |m| m.as_str()));
            }
            3 => {
                if !DATE_PREFIX_RE.is_match(trimmed) {
                    return Err(MalformedRecord::InvalidDate {
                        index,
                        hash: short_hash(fields[0]).to_string(),
                        line: snippet(trimmed),
                    });
                }
                fields.push(trimmed);
                body_start = i + 1;
                break;
            }
            _ => fields.push(trimmed),
        }
    }

    match *fields.as_slice() {
        [hash, author_name, author_email, date] => Ok(Header {
            hash,
            decoration,
            author_name,
            author_email,
            date,
            body_start,
        }),
        _ => Err(MalformedRecord::TooFewFields {
            index,
            found: fields.len(),
        }),
    }
}

fn parse_record(
    index: usize,
    lines: &[&str],
    options: ParseOptions,
) -> Result<RawCommit, MalformedRecord> {
    let header = parse_header(index, lines)?;

    let timestamp =
        parse_timestamp_str(header.date).map_err(|source| MalformedRecord::UnparsableDate {
            index,
            hash: short_hash(header.hash).to_string(),
            value: header.date.to_string(),
            source,
        })?;

    let body = &lines[header.body_start..];
    let (message_lines, rest) = if options.include_file_stats {
        let end = body
            .iter()
            .position(|l| l.trim().is_empty())
            .unwrap_or(body.len());
        (&body[..end], &body[end..])
    } else if options.include_diff {
        let end = body
            .iter()
            .position(|l| l.starts_with(DIFF_MARKER))
            .unwrap_or(body.len());
        (&body[..end], &body[end..])
    } else {
        (body, &body[body.len()..])
    };

    let (file_stats, after_stats) = if options.include_file_stats {
        parse_stat_block(rest)
    } else {
        (Vec::new(), rest)
    };

    let diff = if options.include_diff {
        after_stats
            .iter()
            .position(|l| l.starts_with(DIFF_MARKER))
            .map(|start| after_stats[start..].join("\n").trim().to_string())
            .filter(|d| !d.is_empty())
    } else {
        None
    };

    Ok(RawCommit {
        hash: Some(header.hash.to_string()),
        author_name: Some(header.author_name.to_string()),
        author_email: Some(header.author_email.to_string()),
        date: Some(DateValue::Instant(timestamp)),
        message: Some(message_lines.join("\n").trim().to_string()),
        branches: header.decoration.map(parse_branches).unwrap_or_default(),
        file_stats,
        diff,
        repo: None,
        repo_type: None,
    })
}

/// Parse stat lines after the message, skipping leading blank lines.
///
/// Stops at the first blank or non-matching line and returns the remainder.
fn parse_stat_block<'a, 'b>(lines: &'b [&'a str]) -> (Vec<FileStat>, &'b [&'a str]) {
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let mut stats = Vec::new();
    let mut end = start;

    for line in &lines[start..] {
        let Some(caps) = STAT_LINE_RE.captures(line) else {
            break;
        };
        let count = |i: usize| {
            caps.get(i)
                .map_or(0, |m| m.as_str().parse::<u64>().unwrap_or(0))
        };
        let path = caps.get(3).map_or("", |m| m.as_str().trim());
        stats.push(FileStat::new(path, count(1), count(2)));
        end += 1;
    }

    (stats, &lines[end..])
}

/// Extract local branch names from a `--decorate=full` ref list.
///
/// Keeps `HEAD -> <branch>` and `refs/heads/<branch>`; drops tags, remotes and
/// a detached `HEAD`.
pub fn parse_branches(decoration: &str) -> Vec<String> {
    let mut branches: Vec<String> = Vec::new();
    for entry in decoration.split(',') {
        let entry = entry.trim();
        let name = if let Some(target) = entry.strip_prefix("HEAD -> ") {
            target.trim()
        } else if entry.starts_with("refs/heads/") {
            entry
        } else {
            continue;
        };
        let name = name.strip_prefix("refs/heads/").unwrap_or(name).trim();
        if !name.is_empty() && !branches.iter().any(|b| b == name) {
            branches.push(name.to_string());
        }
    }
    branches
}
