//! Core domain logic for git timesheets.
//!
//! This crate contains the fundamental types and logic for:
//! - Log parsing: decoding `git log` output into commit records
//! - Normalization and analysis: tickets, projects and file types per commit
//! - Session grouping: splitting history into work sessions
//! - Estimation: turning sessions into time estimates and timesheets

pub mod analyzer;
pub mod calendar;
pub mod commit;
pub mod estimator;
pub mod git;
pub mod grouper;
pub mod holidays;
pub mod log_parser;
pub mod multi_repo;
pub mod pattern;
pub mod timesheet;
mod types;

pub use analyzer::{AnalyzerError, CommitAnalyzer, FileKind, FileTypeBuckets, ProjectMapping};
pub use calendar::{TimeOfDay, WeekdaySet, WorkHours};
pub use commit::{Commit, DateValue, FileStat, NormalizeError, RawCommit, TimestampError};
pub use estimator::{EstimateError, EstimatorConfig, TimeEstimate, TimeEstimator};
pub use git::{GitSource, LogOptions, RepoInfo, SourceError};
pub use grouper::{GroupingConfig, GroupingError, Session, SessionGrouper};
pub use holidays::{Holiday, HolidayCalendar, HolidayChecker};
pub use log_parser::{ParseOptions, ParsedLog, parse_log};
pub use multi_repo::{CollectedCommits, DEFAULT_CONCURRENCY, collect_repositories};
pub use pattern::{LearnedPattern, WorkPatternLearner};
pub use timesheet::{
    ConfigError, GenerateOptions, Period, Timesheet, TimesheetConfig, TimesheetError,
    TimesheetGenerator,
};
pub use types::{CommitHash, Confidence, ValidationError};
