//! Timesheet generation: the full pipeline from raw records to rollups.
//!
//! normalize -> deduplicate -> sort -> analyze -> group -> merge -> estimate
//! -> rollups. Any fatal error aborts the call; no partial timesheet is
//! returned.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::{AnalyzerError, CommitAnalyzer, ProjectMapping};
use crate::calendar::calendar_date;
use crate::commit::{Commit, NormalizeError, RawCommit, deduplicate, normalize, raw_hash_prefix};
use crate::estimator::{EstimateError, EstimatorConfig, TimeEstimate, TimeEstimator};
use crate::grouper::{GroupingConfig, GroupingError, Session, SessionGrouper};
use crate::pattern::LearnedPattern;

/// Number of commit subjects quoted in a session summary.
const SUMMARY_MESSAGES: usize = 5;

/// Upper bound for gap settings. Sessions never span calendar days anyway.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Largest accepted distance from UTC, either direction.
const MAX_UTC_OFFSET_MINUTES: i64 = 24 * 60;

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("min session duration ({min}) exceeds max session duration ({max})")]
    SessionBounds { min: f64, max: f64 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be at most {max} minutes in magnitude, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },

    #[error("multiplier {name} must be a non-negative number, got {value}")]
    InvalidMultiplier { name: &'static str, value: f64 },

    #[error("work hours end ({end}) before they start ({start})")]
    InvalidWorkHours { start: String, end: String },
}

/// Everything a timesheet run can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimesheetConfig {
    pub grouping: GroupingConfig,
    pub estimation: EstimatorConfig,
    /// User project mappings; these override built-in mappings of the same name.
    pub projects: BTreeMap<String, ProjectMapping>,
}

impl TimesheetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.grouping;
        let e = &self.estimation;

        #[allow(clippy::cast_precision_loss, reason = "minute thresholds are small")]
        let (gap, merge_gap) = (g.gap_threshold_minutes as f64, g.merge_gap_minutes as f64);
        for (field, value) in [
            ("gap threshold", gap),
            ("merge gap", merge_gap),
            ("base minutes per commit", e.base_minutes_per_commit),
            ("max session duration", e.max_session_minutes),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        let offset = i64::from(g.utc_offset_minutes);
        for (field, value, max) in [
            ("gap threshold", g.gap_threshold_minutes, MAX_GAP_MINUTES),
            ("merge gap", g.merge_gap_minutes, MAX_GAP_MINUTES),
            ("utc offset", offset, MAX_UTC_OFFSET_MINUTES),
        ] {
            if !(-max..=max).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value, max });
            }
        }
        if !e.min_session_minutes.is_finite() || e.min_session_minutes < 0.0 {
            return Err(ConfigError::NotPositive {
                field: "min session duration",
                value: e.min_session_minutes,
            });
        }
        if e.min_session_minutes > e.max_session_minutes {
            return Err(ConfigError::SessionBounds {
                min: e.min_session_minutes,
                max: e.max_session_minutes,
            });
        }

        let quick_fix = ("quick_fix", e.quick_fix_multiplier);
        for (name, value) in e.complexity_multipliers.entries().into_iter().chain([quick_fix]) {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidMultiplier { name, value });
            }
        }

        if !g.work_hours.is_valid() {
            return Err(ConfigError::InvalidWorkHours {
                start: g.work_hours.start.to_string(),
                end: g.work_hours.end.to_string(),
            });
        }
        Ok(())
    }
}

/// Fatal errors for one generation call.
#[derive(Debug, Error)]
pub enum TimesheetError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error("no valid commits after normalization ({dropped} records dropped)")]
    EmptyInput { dropped: usize },

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Estimate(#[from] EstimateError),
}

/// Inclusive date range covered by a timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Reported period; derived from the commits when absent.
    pub period: Option<Period>,
    /// Records already dropped upstream (e.g. malformed log records), added
    /// to the diagnostics.
    pub upstream_dropped: usize,
}

/// One row per estimated session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEntry {
    /// 1-based position in the timesheet.
    pub id: usize,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
    /// Rounded to two decimals.
    pub duration_hours: f64,
    pub commit_count: usize,
    /// Rounded to two decimals.
    pub confidence: f64,
    pub projects: Vec<String>,
    pub tickets: Vec<String>,
    pub summary: String,
    pub commit_hashes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRollup {
    /// Session ids on this date.
    pub sessions: Vec<usize>,
    pub minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectRollup {
    pub commits: usize,
    /// Session minutes split evenly across each session's commits.
    pub minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryInfo {
    pub repositories: Vec<String>,
    pub repo_types: BTreeMap<String, String>,
    /// Set when exactly one repository contributed commits.
    pub repository: Option<String>,
    pub repo_type: Option<String>,
    pub minutes_by_repository: BTreeMap<String, f64>,
}

/// What the pipeline dropped or decided along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Records dropped upstream or during normalization.
    pub records_dropped: usize,
    /// Reasons for records dropped during normalization.
    pub drop_reasons: Vec<String>,
    pub duplicates_removed: usize,
    pub sessions_filtered: usize,
    pub commits_filtered: usize,
    pub learned_pattern: Option<LearnedPattern>,
    pub pattern_applied: bool,
}

/// The generated timesheet. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timesheet {
    pub period: Period,
    pub total_minutes: f64,
    /// Rounded to two decimals.
    pub total_hours: f64,
    pub total_sessions: usize,
    pub total_commits: usize,
    pub repositories: RepositoryInfo,
    pub sessions: Vec<SessionEntry>,
    pub estimates: Vec<TimeEstimate>,
    /// Analyzed commits, oldest first.
    pub commits: Vec<Commit>,
    pub by_date: BTreeMap<NaiveDate, DateRollup>,
    pub by_project: BTreeMap<String, ProjectRollup>,
    pub by_ticket: BTreeMap<String, usize>,
    pub diagnostics: Diagnostics,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Orchestrates the pipeline. Holds no per-call state, so one generator can
/// serve concurrent calls.
#[derive(Debug)]
pub struct TimesheetGenerator {
    config: TimesheetConfig,
    analyzer: CommitAnalyzer,
    grouper: SessionGrouper,
    estimator: TimeEstimator,
}

impl TimesheetGenerator {
    /// Validate the configuration and build the pipeline stages.
    pub fn new(config: TimesheetConfig) -> Result<Self, TimesheetError> {
        config.validate()?;
        let analyzer = CommitAnalyzer::new(&config.projects)?;
        let grouper = SessionGrouper::new(config.grouping.clone());
        let estimator = TimeEstimator::new(config.estimation.clone());
        Ok(Self {
            config,
            analyzer,
            grouper,
            estimator,
        })
    }

    pub const fn config(&self) -> &TimesheetConfig {
        &self.config
    }

    /// Run the pipeline over raw commit records.
    pub fn generate(
        &self,
        records: Vec<RawCommit>,
        options: &GenerateOptions,
    ) -> Result<Timesheet, TimesheetError> {
        let received = records.len();
        let mut drop_reasons = Vec::new();
        let mut commits = Vec::with_capacity(received);
        for record in records {
            let prefix = raw_hash_prefix(&record);
            match normalize(record) {
                Ok(commit) => commits.push(commit),
                Err(err) => {
                    tracing::debug!(hash = %prefix, error = %err, "dropping invalid commit record");
                    drop_reasons.push(describe_drop(&prefix, &err));
                }
            }
        }
        let records_dropped = options.upstream_dropped + drop_reasons.len();
        if commits.is_empty() {
            return Err(TimesheetError::EmptyInput {
                dropped: records_dropped,
            });
        }

        let normalized = commits.len();
        let mut commits = deduplicate(commits);
        let duplicates_removed = normalized - commits.len();
        commits.sort_by_key(|c| c.timestamp);
        let commits = self.analyzer.analyze_batch(commits);

        let outcome = self.grouper.group(&commits)?;
        let sessions = self.grouper.merge_adjacent(outcome.sessions)?;
        let estimates = self.estimator.estimate_sessions(&sessions)?;
        tracing::debug!(
            received,
            commits = commits.len(),
            sessions = sessions.len(),
            "generated timesheet"
        );

        let diagnostics = Diagnostics {
            records_dropped,
            drop_reasons,
            duplicates_removed,
            sessions_filtered: outcome.filtered_sessions,
            commits_filtered: outcome.filtered_commits,
            learned_pattern: outcome.learned_pattern,
            pattern_applied: outcome.pattern_applied,
        };
        Ok(self.build(commits, &sessions, estimates, options, diagnostics))
    }

    fn day(&self, t: DateTime<Utc>) -> NaiveDate {
        calendar_date(t, self.config.grouping.utc_offset_minutes).unwrap_or_else(|| t.date_naive())
    }

    fn build(
        &self,
        commits: Vec<Commit>,
        sessions: &[Session],
        estimates: Vec<TimeEstimate>,
        options: &GenerateOptions,
        diagnostics: Diagnostics,
    ) -> Timesheet {
        let mut by_date: BTreeMap<NaiveDate, DateRollup> = BTreeMap::new();
        let mut by_project: BTreeMap<String, ProjectRollup> = BTreeMap::new();
        let mut by_ticket: BTreeMap<String, usize> = BTreeMap::new();
        let mut repositories = RepositoryInfo::default();

        for commit in &commits {
            if let Some(project) = &commit.project {
                by_project.entry(project.clone()).or_default().commits += 1;
            }
            for ticket in &commit.tickets {
                *by_ticket.entry(ticket.clone()).or_default() += 1;
            }
            if let Some(repo) = &commit.repo {
                if !repositories.repositories.contains(repo) {
                    repositories.repositories.push(repo.clone());
                }
                if let Some(repo_type) = &commit.repo_type {
                    repositories
                        .repo_types
                        .insert(repo.clone(), repo_type.clone());
                }
            }
        }

        let mut entries = Vec::with_capacity(sessions.len());
        for (index, (session, estimate)) in sessions.iter().zip(&estimates).enumerate() {
            let id = index + 1;
            let date = self.day(estimate.start_time);
            let rollup = by_date.entry(date).or_default();
            rollup.sessions.push(id);
            rollup.minutes += estimate.duration_minutes;

            #[allow(clippy::cast_precision_loss, reason = "commit counts fit in f64")]
            let per_commit = estimate.duration_minutes / session.len() as f64;
            for commit in session.commits() {
                if let Some(project) = &commit.project {
                    by_project.entry(project.clone()).or_default().minutes += per_commit;
                }
                if let Some(repo) = &commit.repo {
                    *repositories
                        .minutes_by_repository
                        .entry(repo.clone())
                        .or_default() += per_commit;
                }
            }

            entries.push(session_entry(id, date, session, estimate));
        }

        if let [only] = repositories.repositories.as_slice() {
            repositories.repository = Some(only.clone());
            repositories.repo_type = repositories.repo_types.get(only).cloned();
        }

        let total_minutes: f64 = estimates.iter().map(|e| e.duration_minutes).sum();
        let period = options.period.unwrap_or_else(|| Period {
            start: commits.first().map_or_else(|| Utc::now().date_naive(), |c| self.day(c.timestamp)),
            end: commits.last().map_or_else(|| Utc::now().date_naive(), |c| self.day(c.timestamp)),
        });

        Timesheet {
            period,
            total_minutes,
            total_hours: round2(total_minutes / 60.0),
            total_sessions: estimates.len(),
            total_commits: commits.len(),
            repositories,
            sessions: entries,
            estimates,
            commits,
            by_date,
            by_project,
            by_ticket,
            diagnostics,
        }
    }
}

fn describe_drop(prefix: &str, err: &NormalizeError) -> String {
    if prefix.is_empty() {
        err.to_string()
    } else {
        format!("{prefix}: {err}")
    }
}

fn session_entry(id: usize, date: NaiveDate, session: &Session, estimate: &TimeEstimate) -> SessionEntry {
    let mut projects: Vec<String> = Vec::new();
    let mut tickets: BTreeSet<String> = BTreeSet::new();
    for commit in session.commits() {
        if let Some(project) = &commit.project {
            if !projects.contains(project) {
                projects.push(project.clone());
            }
        }
        tickets.extend(commit.tickets.iter().cloned());
    }

    SessionEntry {
        id,
        date,
        start_time: estimate.start_time,
        end_time: estimate.end_time,
        duration_minutes: estimate.duration_minutes,
        duration_hours: round2(estimate.duration_hours()),
        commit_count: estimate.commit_count,
        confidence: round2(estimate.confidence.value()),
        projects,
        tickets: tickets.into_iter().collect(),
        summary: summarize(session.commits()),
        commit_hashes: session
            .commits()
            .iter()
            .map(|c| c.hash.to_string())
            .collect(),
    }
}

/// First lines of up to five commit messages, joined with `; `.
pub fn summarize(commits: &[Commit]) -> String {
    if commits.is_empty() {
        return "No commits".to_string();
    }
    let mut summary = commits
        .iter()
        .take(SUMMARY_MESSAGES)
        .map(Commit::subject)
        .collect::<Vec<_>>()
        .join("; ");
    if commits.len() > SUMMARY_MESSAGES {
        summary.push_str(&format!(" (+{} more)", commits.len() - SUMMARY_MESSAGES));
    }
    summary
}
