//! Session grouping.
//!
//! Ascending commits are scanned pairwise. A new session starts when any of
//! these holds for the later commit:
//! - the gap to the previous commit exceeds the gap threshold;
//! - it falls on a different calendar day;
//! - it falls on a weekend and weekends are excluded;
//! - it falls on a holiday and holidays are excluded.
//!
//! Sessions starting on excluded days are then dropped. In work-hours-only
//! mode a session must also start or end inside the work-hour window.
//! [`SessionGrouper::merge_adjacent`] folds same-day neighbours afterwards.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{WorkHours, calendar_date, is_weekend};
use crate::commit::Commit;
use crate::holidays::{HolidayCalendar, HolidayChecker};
use crate::pattern::{LearnedPattern, WorkPatternLearner};

/// Learned patterns below this confidence never override configuration.
const PATTERN_OVERRIDE_CONFIDENCE: f64 = 0.5;

/// Contract violations reaching the grouper.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupingError {
    #[error("commit {hash}: timestamp {timestamp} cannot be placed on a calendar day")]
    InvalidTimestamp { hash: String, timestamp: String },
}

/// Configuration for session grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Largest gap between commits of one session.
    /// Default: 30 minutes.
    pub gap_threshold_minutes: i64,

    /// Largest gap between same-day sessions that are merged.
    /// Default: 60 minutes.
    pub merge_gap_minutes: i64,

    pub exclude_weekends: bool,
    pub exclude_holidays: bool,

    /// ISO country code for built-in holiday rules.
    pub holiday_country: String,
    /// Region within the country, e.g. `MA` or `US-MA`.
    pub holiday_region: Option<String>,
    pub custom_holidays: Vec<NaiveDate>,

    /// Work-hour window, compared in UTC.
    pub work_hours: WorkHours,
    /// Drop sessions that neither start nor end inside `work_hours`.
    pub exclude_non_work_hours: bool,

    /// Learn work hours, gap and weekend handling from the commits being
    /// grouped, for this run only.
    pub learn_patterns: bool,

    /// Offset from UTC used to decide calendar days, weekends and holidays.
    /// Default: 0.
    pub utc_offset_minutes: i32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            gap_threshold_minutes: 30,
            merge_gap_minutes: 60,
            exclude_weekends: true,
            exclude_holidays: false,
            holiday_country: "US".to_string(),
            holiday_region: None,
            custom_holidays: Vec::new(),
            work_hours: WorkHours::default(),
            exclude_non_work_hours: false,
            learn_patterns: false,
            utc_offset_minutes: 0,
        }
    }
}

/// A run of commits treated as one block of work.
///
/// Always holds at least one commit; `start` and `end` are the first and last
/// commit timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    commits: Vec<Commit>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Session {
    fn new(first: Commit) -> Self {
        Self {
            start: first.timestamp,
            end: first.timestamp,
            commits: vec![first],
        }
    }

    #[cfg(test)]
    pub(crate) const fn from_parts(
        commits: Vec<Commit>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            commits,
            start,
            end,
        }
    }

    fn push(&mut self, commit: Commit) {
        self.end = self.end.max(commit.timestamp);
        self.start = self.start.min(commit.timestamp);
        self.commits.push(commit);
    }

    fn absorb(&mut self, other: Self) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        self.commits.extend(other.commits);
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Never true for sessions built by the grouper.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Wall-clock span in minutes.
    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// Output of one grouping run.
#[derive(Debug, Clone, Default)]
pub struct GroupingOutcome {
    pub sessions: Vec<Session>,
    /// Pattern learned for this run, if learning was enabled.
    pub learned_pattern: Option<LearnedPattern>,
    /// Whether the learned pattern overrode the configuration.
    pub pattern_applied: bool,
    /// Sessions removed by weekend, holiday or work-hour filters.
    pub filtered_sessions: usize,
    /// Commits inside the removed sessions.
    pub filtered_commits: usize,
}

/// Groups commits into [`Session`]s.
pub struct SessionGrouper {
    config: GroupingConfig,
    holidays: Box<dyn HolidayCalendar>,
}

impl fmt::Debug for SessionGrouper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGrouper")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionGrouper {
    /// Grouper using the built-in holiday rules named in `config`.
    pub fn new(config: GroupingConfig) -> Self {
        let holidays: Box<dyn HolidayCalendar> = if config.exclude_holidays {
            Box::new(HolidayChecker::new(
                &config.holiday_country,
                config.holiday_region.as_deref(),
                &config.custom_holidays,
            ))
        } else {
            Box::new(HolidayChecker::custom_only(&config.custom_holidays))
        };
        Self { config, holidays }
    }

    /// Replace the holiday calendar. Only consulted when holidays are excluded.
    #[must_use]
    pub fn with_holiday_calendar(mut self, calendar: Box<dyn HolidayCalendar>) -> Self {
        self.holidays = calendar;
        self
    }

    pub const fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// Configuration for one run, with a learned pattern applied if trusted.
    fn effective_config(&self, commits: &[Commit]) -> (GroupingConfig, Option<LearnedPattern>, bool) {
        let mut config = self.config.clone();
        if !config.learn_patterns {
            return (config, None, false);
        }
        let Some(pattern) = WorkPatternLearner::new(config.utc_offset_minutes).learn(commits) else {
            return (config, None, false);
        };
        let trusted = pattern.confidence.value() > PATTERN_OVERRIDE_CONFIDENCE;
        if trusted {
            config.work_hours = pattern.work_hours;
            if pattern.typical_gap_minutes > 0 {
                config.gap_threshold_minutes = pattern.typical_gap_minutes;
            }
            config.exclude_weekends = pattern.exclude_weekends();
            tracing::debug!(
                work_hours = %config.work_hours,
                gap = config.gap_threshold_minutes,
                exclude_weekends = config.exclude_weekends,
                "applying learned work pattern"
            );
        } else {
            tracing::debug!(
                confidence = %pattern.confidence,
                "learned work pattern not trusted, keeping configuration"
            );
        }
        (config, Some(pattern), trusted)
    }

    fn day_of(commit: &Commit, offset: i32) -> Result<NaiveDate, GroupingError> {
        calendar_date(commit.timestamp, offset).ok_or_else(|| GroupingError::InvalidTimestamp {
            hash: commit.hash.short().to_string(),
            timestamp: commit.timestamp.to_rfc3339(),
        })
    }

    fn is_excluded_day(&self, config: &GroupingConfig, day: NaiveDate) -> bool {
        (config.exclude_weekends && is_weekend(day))
            || (config.exclude_holidays && self.holidays.is_holiday(day))
    }

    /// Group commits, in any order, into sessions and apply calendar filters.
    ///
    /// Empty input yields no sessions.
    pub fn group(&self, commits: &[Commit]) -> Result<GroupingOutcome, GroupingError> {
        if commits.is_empty() {
            return Ok(GroupingOutcome::default());
        }

        let (config, learned_pattern, pattern_applied) = self.effective_config(commits);
        let offset = config.utc_offset_minutes;
        let threshold = minutes_saturating(config.gap_threshold_minutes);

        let mut sorted = commits.to_vec();
        sorted.sort_by_key(|c| c.timestamp);

        let mut sessions: Vec<(NaiveDate, Session)> = Vec::new();
        let mut prev: Option<(DateTime<Utc>, NaiveDate)> = None;
        for commit in sorted {
            let day = Self::day_of(&commit, offset)?;
            let timestamp = commit.timestamp;
            let starts_new = prev.is_none_or(|(prev_ts, prev_day)| {
                timestamp - prev_ts > threshold
                    || day != prev_day
                    || self.is_excluded_day(&config, day)
            });
            match sessions.last_mut() {
                Some((_, current)) if !starts_new => current.push(commit),
                _ => sessions.push((day, Session::new(commit))),
            }
            prev = Some((timestamp, day));
        }

        let total = sessions.len();
        let total_commits: usize = sessions.iter().map(|(_, s)| s.len()).sum();
        let filtering = config.exclude_weekends || config.exclude_holidays || config.exclude_non_work_hours;
        let kept: Vec<Session> = sessions
            .into_iter()
            .filter(|(start_day, session)| {
                if !filtering {
                    return true;
                }
                if self.is_excluded_day(&config, *start_day) {
                    return false;
                }
                !config.exclude_non_work_hours
                    || config.work_hours.contains(session.start)
                    || config.work_hours.contains(session.end)
            })
            .map(|(_, s)| s)
            .collect();

        let kept_commits: usize = kept.iter().map(Session::len).sum();
        tracing::debug!(
            sessions = kept.len(),
            filtered = total - kept.len(),
            "grouped commits into sessions"
        );

        Ok(GroupingOutcome {
            filtered_sessions: total - kept.len(),
            filtered_commits: total_commits - kept_commits,
            sessions: kept,
            learned_pattern,
            pattern_applied,
        })
    }

    /// Merge chronologically adjacent sessions using the configured merge gap.
    pub fn merge_adjacent(&self, sessions: Vec<Session>) -> Result<Vec<Session>, GroupingError> {
        merge_adjacent_sessions(
            sessions,
            self.config.merge_gap_minutes,
            self.config.utc_offset_minutes,
        )
    }
}

fn minutes_saturating(minutes: i64) -> Duration {
    Duration::try_minutes(minutes).unwrap_or(if minutes < 0 { Duration::MIN } else { Duration::MAX })
}

/// One left-to-right fold: a session absorbs the next one when both start on
/// the same calendar day and the gap between them is at most `max_gap_minutes`.
///
/// Greedy, so with three or more eligible sessions in a row the result depends
/// on order.
pub fn merge_adjacent_sessions(
    sessions: Vec<Session>,
    max_gap_minutes: i64,
    utc_offset_minutes: i32,
) -> Result<Vec<Session>, GroupingError> {
    let max_gap = minutes_saturating(max_gap_minutes);
    let start_day = |s: &Session| -> Result<NaiveDate, GroupingError> {
        s.commits
            .first()
            .map_or(Ok(s.start.date_naive()), |c| {
                SessionGrouper::day_of(c, utc_offset_minutes)
            })
    };

    let mut merged: Vec<Session> = Vec::with_capacity(sessions.len());
    let mut current_day: Option<NaiveDate> = None;
    for next in sessions {
        let next_day = start_day(&next)?;
        match merged.last_mut() {
            Some(current)
                if current_day == Some(next_day) && next.start - current.end <= max_gap =>
            {
                current.absorb(next);
            }
            _ => {
                current_day = Some(next_day);
                merged.push(next);
            }
        }
    }
    Ok(merged)
}
