//! Session duration estimation.
//!
//! ```text
//! base       = max(commits * base_per_commit, span)
//! estimate   = clamp(base * complexity * message_hint + gap_time, min, max)
//! ```
//!
//! - `complexity` comes from total changed lines, or from a dedicated
//!   multiplier when the session touches a single test, doc or config file.
//! - `message_hint` is the first matching [`MessageRule`].
//! - `gap_time` is 30% of every inter-commit gap of at most two hours.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::{FileKind, classify_path};
use crate::commit::Commit;
use crate::grouper::Session;
use crate::types::Confidence;

/// Share of an inter-commit gap counted as work.
const GAP_WORK_SHARE: f64 = 0.3;

/// Gaps longer than this are not counted.
const MAX_COUNTED_GAP_MINUTES: f64 = 120.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("session has no commits")]
    EmptySession,
    #[error("session ends ({end}) before it starts ({start})")]
    InvalidRange { start: String, end: String },
}

/// Multipliers applied by file type and message keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityMultipliers {
    pub test: f64,
    pub doc: f64,
    pub config: f64,
    pub feature: f64,
    pub refactor: f64,
    pub bugfix: f64,
}

impl Default for ComplexityMultipliers {
    fn default() -> Self {
        Self {
            test: 0.5,
            doc: 0.3,
            config: 0.2,
            feature: 1.5,
            refactor: 2.0,
            bugfix: 1.0,
        }
    }
}

impl ComplexityMultipliers {
    /// Named values, for validation and display.
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("test", self.test),
            ("doc", self.doc),
            ("config", self.config),
            ("feature", self.feature),
            ("refactor", self.refactor),
            ("bugfix", self.bugfix),
        ]
    }
}

/// Configuration for the time estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Lower bound of an estimate.
    /// Default: 15 minutes.
    pub min_session_minutes: f64,

    /// Upper bound of an estimate.
    /// Default: 480 minutes (8 hours).
    pub max_session_minutes: f64,

    /// Floor per commit before multipliers.
    /// Default: 10 minutes.
    pub base_minutes_per_commit: f64,

    /// Hint for quick fixes and typos.
    /// Default: 0.5.
    pub quick_fix_multiplier: f64,

    pub complexity_multipliers: ComplexityMultipliers,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_session_minutes: 15.0,
            max_session_minutes: 480.0, // 8 hours
            base_minutes_per_commit: 10.0,
            quick_fix_multiplier: 0.5,
            complexity_multipliers: ComplexityMultipliers::default(),
        }
    }
}

/// Category of a message keyword rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    QuickFix,
    Refactor,
    Feature,
    Bugfix,
}

/// A keyword rule: if any keyword occurs in the lowercased messages, the
/// multiplier applies.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRule {
    pub kind: HintKind,
    pub keywords: &'static [&'static str],
    pub multiplier: f64,
}

impl MessageRule {
    pub fn matches(&self, lowercase_messages: &str) -> bool {
        self.keywords.iter().any(|k| lowercase_messages.contains(k))
    }
}

/// Message rules in priority order; the first match wins.
pub fn message_rules(config: &EstimatorConfig) -> Vec<MessageRule> {
    let m = &config.complexity_multipliers;
    vec![
        MessageRule {
            kind: HintKind::QuickFix,
            keywords: &["quick fix", "typo", "fix typo", "minor"],
            multiplier: config.quick_fix_multiplier,
        },
        MessageRule {
            kind: HintKind::Refactor,
            keywords: &["refactor", "restructure", "cleanup"],
            multiplier: m.refactor,
        },
        MessageRule {
            kind: HintKind::Feature,
            keywords: &["feature", "implement", "add"],
            multiplier: m.feature,
        },
        MessageRule {
            kind: HintKind::Bugfix,
            keywords: &["fix", "bug"],
            multiplier: m.bugfix,
        },
    ]
}

/// How an estimate was put together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateBreakdown {
    pub base_minutes: f64,
    pub complexity_multiplier: f64,
    pub message_hint: f64,
    pub message_rule: Option<HintKind>,
    pub gap_minutes: f64,
    /// Estimate before clamping to the configured bounds.
    pub unclamped_minutes: f64,
}

/// Estimated work time for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEstimate {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
    pub commit_count: usize,
    pub confidence: Confidence,
    pub breakdown: EstimateBreakdown,
}

impl TimeEstimate {
    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes / 60.0
    }
}

#[allow(clippy::cast_precision_loss, reason = "minute counts fit in f64")]
fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

/// Estimates session durations.
#[derive(Debug, Clone)]
pub struct TimeEstimator {
    config: EstimatorConfig,
    rules: Vec<MessageRule>,
}

impl Default for TimeEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl TimeEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let rules = message_rules(&config);
        Self { config, rules }
    }

    pub const fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn rules(&self) -> &[MessageRule] {
        &self.rules
    }

    /// Estimate one session.
    pub fn estimate_session(&self, session: &Session) -> Result<TimeEstimate, EstimateError> {
        if session.is_empty() {
            return Err(EstimateError::EmptySession);
        }
        let (start, end) = (session.start(), session.end());
        if end < start {
            return Err(EstimateError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }

        let commits = session.commits();
        let span = minutes_between(start, end);
        let base_minutes = self.base_minutes(commits.len(), span);
        let complexity_multiplier = self.complexity(commits);
        let (message_rule, message_hint) = self.message_hint(commits);
        let gap_minutes = gap_time(commits);

        let unclamped_minutes = base_minutes * complexity_multiplier * message_hint + gap_minutes;
        let duration_minutes = unclamped_minutes
            .min(self.config.max_session_minutes)
            .max(self.config.min_session_minutes);

        Ok(TimeEstimate {
            start_time: start,
            end_time: end,
            duration_minutes,
            commit_count: commits.len(),
            confidence: confidence(commits, span),
            breakdown: EstimateBreakdown {
                base_minutes,
                complexity_multiplier,
                message_hint,
                message_rule,
                gap_minutes,
                unclamped_minutes,
            },
        })
    }

    /// Estimate several sessions, failing on the first invalid one.
    pub fn estimate_sessions(&self, sessions: &[Session]) -> Result<Vec<TimeEstimate>, EstimateError> {
        sessions.iter().map(|s| self.estimate_session(s)).collect()
    }

    #[allow(clippy::cast_precision_loss, reason = "commit counts fit in f64")]
    fn base_minutes(&self, commit_count: usize, span_minutes: f64) -> f64 {
        (commit_count as f64 * self.config.base_minutes_per_commit).max(span_minutes)
    }

    fn complexity(&self, commits: &[Commit]) -> f64 {
        let lines: u64 = commits
            .iter()
            .flat_map(|c| &c.file_stats)
            .map(crate::commit::FileStat::lines_changed)
            .fold(0, u64::saturating_add);

        let paths: BTreeSet<&str> = commits
            .iter()
            .flat_map(|c| &c.file_stats)
            .map(|s| s.path.as_str())
            .collect();
        if let [only] = paths.iter().copied().collect::<Vec<_>>().as_slice() {
            let m = &self.config.complexity_multipliers;
            match classify_path(only) {
                FileKind::Test => return m.test,
                FileKind::Doc => return m.doc,
                FileKind::Config => return m.config,
                _ => {}
            }
        }

        match lines {
            l if l > 1000 => 2.0,
            l if l > 500 => 1.5,
            l if l > 100 => 1.2,
            l if l < 10 => 0.5,
            _ => 1.0,
        }
    }

    fn message_hint(&self, commits: &[Commit]) -> (Option<HintKind>, f64) {
        let messages = commits
            .iter()
            .map(|c| c.message.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        self.rules
            .iter()
            .find(|r| r.matches(&messages))
            .map_or((None, 1.0), |r| (Some(r.kind), r.multiplier))
    }
}

/// Work time credited for gaps between consecutive commits.
fn gap_time(commits: &[Commit]) -> f64 {
    let mut times: Vec<DateTime<Utc>> = commits.iter().map(|c| c.timestamp).collect();
    times.sort_unstable();
    times
        .windows(2)
        .map(|w| minutes_between(w[0], w[1]))
        .filter(|&gap| gap <= MAX_COUNTED_GAP_MINUTES)
        .map(|gap| gap * GAP_WORK_SHARE)
        .sum()
}

fn confidence(commits: &[Commit], span_minutes: f64) -> Confidence {
    let mut score = 0.5;
    if commits.len() > 5 {
        score += 0.2;
    } else if commits.len() > 2 {
        score += 0.1;
    }
    if commits.iter().any(Commit::has_file_stats) {
        score += 0.2;
    }
    if span_minutes > 30.0 && span_minutes < 480.0 {
        score += 0.1;
    }
    Confidence::clamped(score)
}
