//! Learning work hours, work days and typical commit gaps from history.
//!
//! The result is a per-run [`LearnedPattern`]. It is never persisted; the
//! grouper may use it to override its configuration for a single run.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

use crate::calendar::{TimeOfDay, WeekdaySet, WorkHours, calendar_date};
use crate::commit::Commit;
use crate::types::Confidence;

/// Share of distinct commit hours that define the work window.
const TOP_HOUR_SHARE: f64 = 0.3;

/// Minimum learned window length in hours.
const MIN_WINDOW_HOURS: u32 = 8;

/// Gap assumed when there is only one commit.
const DEFAULT_GAP_MINUTES: i64 = 30;

/// Sample-size tier behind a learned pattern's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    /// Fewer than 10 commits.
    Low,
    /// Fewer than 50 commits.
    Medium,
    High,
}

impl ConfidenceTier {
    pub const fn for_sample_size(commits: usize) -> Self {
        if commits < 10 {
            Self::Low
        } else if commits < 50 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub const fn confidence(self) -> Confidence {
        match self {
            Self::Low => Confidence::clamped(0.3),
            Self::Medium => Confidence::clamped(0.6),
            Self::High => Confidence::clamped(0.8),
        }
    }
}

/// Work parameters inferred from commit timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnedPattern {
    pub work_hours: WorkHours,
    pub work_days: WeekdaySet,
    pub typical_gap_minutes: i64,
    pub tier: ConfidenceTier,
    pub confidence: Confidence,
    pub sample_size: usize,
    #[serde(skip)]
    utc_offset_minutes: i32,
}

impl LearnedPattern {
    /// Whether weekends should be excluded under this pattern.
    pub const fn exclude_weekends(&self) -> bool {
        !self.work_days.includes_weekend()
    }

    /// Whether `dt` falls inside the learned hours (UTC, end exclusive) and
    /// on a learned work day.
    pub fn matches(&self, dt: DateTime<Utc>) -> bool {
        let t = TimeOfDay::of_instant(dt);
        if t < self.work_hours.start || t >= self.work_hours.end {
            return false;
        }
        calendar_date(dt, self.utc_offset_minutes)
            .is_some_and(|date| self.work_days.contains(date.weekday()))
    }
}

/// Infers a [`LearnedPattern`] from commit history.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkPatternLearner {
    utc_offset_minutes: i32,
}

impl WorkPatternLearner {
    /// Weekdays are taken at `utc_offset_minutes`; hours are always UTC.
    pub const fn new(utc_offset_minutes: i32) -> Self {
        Self { utc_offset_minutes }
    }

    /// Learn from the given commits, in any order. `None` when empty.
    pub fn learn(&self, commits: &[Commit]) -> Option<LearnedPattern> {
        let mut times: Vec<DateTime<Utc>> = commits.iter().map(|c| c.timestamp).collect();
        if times.is_empty() {
            return None;
        }
        times.sort_unstable();

        let work_hours = learn_hours(&times);
        let work_days = self.learn_days(&times);
        let typical_gap_minutes = typical_gap(&times);
        let tier = ConfidenceTier::for_sample_size(times.len());

        let pattern = LearnedPattern {
            work_hours,
            work_days,
            typical_gap_minutes,
            tier,
            confidence: tier.confidence(),
            sample_size: times.len(),
            utc_offset_minutes: self.utc_offset_minutes,
        };
        tracing::debug!(
            work_hours = %pattern.work_hours,
            gap = pattern.typical_gap_minutes,
            confidence = %pattern.confidence,
            "learned work pattern"
        );
        Some(pattern)
    }

    fn learn_days(&self, times: &[DateTime<Utc>]) -> WeekdaySet {
        let observed: WeekdaySet = times
            .iter()
            .filter_map(|&t| calendar_date(t, self.utc_offset_minutes))
            .map(|d| d.weekday())
            .collect();

        let mut days: WeekdaySet = observed
            .iter()
            .filter(|d| d.number_from_monday() <= 5)
            .collect();
        if days.is_empty() {
            days = WeekdaySet::weekdays();
        }
        for weekend_day in observed.iter().filter(|d| d.number_from_monday() > 5) {
            days.insert(weekend_day);
        }
        days
    }
}

/// Window spanning the most frequent ~30% of commit hours, at least 8 hours long.
fn learn_hours(times: &[DateTime<Utc>]) -> WorkHours {
    let mut frequency = [0usize; 24];
    for t in times {
        frequency[t.hour() as usize] += 1;
    }

    let mut hours: Vec<u32> = (0..24u32).filter(|&h| frequency[h as usize] > 0).collect();
    // Most frequent first; ties keep ascending hour order.
    hours.sort_by(|a, b| frequency[*b as usize].cmp(&frequency[*a as usize]));

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "at most 24 distinct hours"
    )]
    let take = ((hours.len() as f64) * TOP_HOUR_SHARE).ceil() as usize;
    let top = &hours[..take.clamp(1, hours.len())];

    let start_hour = top.iter().copied().min().unwrap_or(9);
    let max_hour = top.iter().copied().max().unwrap_or(start_hour);
    let end_hour = (max_hour + 1).max(start_hour + MIN_WINDOW_HOURS);

    WorkHours::new(
        TimeOfDay::from_minutes(start_hour * 60),
        TimeOfDay::from_minutes(end_hour * 60),
    )
}

/// Upper median of consecutive gaps in whole minutes.
fn typical_gap(sorted: &[DateTime<Utc>]) -> i64 {
    let mut gaps: Vec<i64> = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .collect();
    if gaps.is_empty() {
        return DEFAULT_GAP_MINUTES;
    }
    gaps.sort_unstable();
    let median_secs = gaps[gaps.len() / 2];
    // Round half up to the nearest minute.
    (median_secs + 30).div_euclid(60)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Weekday};

    use super::*;
    use crate::commit::{RawCommit, normalize};

    /// Wednesday 2025-01-15 09:00 UTC plus `minutes`.
    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn commit_at(i: usize, at: DateTime<Utc>) -> Commit {
        normalize(RawCommit {
            hash: Some(format!("{i:07x}")),
            date: Some(at.into()),
            ..RawCommit::default()
        })
        .unwrap()
    }

    fn commits(times: &[DateTime<Utc>]) -> Vec<Commit> {
        times.iter().enumerate().map(|(i, &t)| commit_at(i, t)).collect()
    }

    #[test]
    fn empty_history_learns_nothing() {
        assert!(WorkPatternLearner::default().learn(&[]).is_none());
    }

    #[test]
    fn single_commit_defaults() {
        let pattern = WorkPatternLearner::default()
            .learn(&commits(&[ts(0)]))
            .unwrap();
        assert_eq!(pattern.typical_gap_minutes, 30);
        assert_eq!(pattern.tier, ConfidenceTier::Low);
        assert_eq!(pattern.work_hours.to_string(), "09:00-17:00");
        assert_eq!(pattern.work_days, [Weekday::Wed].into_iter().collect::<WeekdaySet>());
        assert!(pattern.exclude_weekends());
    }

    #[test]
    fn window_spans_top_hours_and_at_least_eight() {
        // Hours 10 (x4), 11 (x3), 14 (x2), 20 (x1): top ceil(30% of 4) = 2 hours.
        let mut times = Vec::new();
        for (hour, count) in [(10, 4), (11, 3), (14, 2), (20, 1)] {
            for i in 0..count {
                times.push(Utc.with_ymd_and_hms(2025, 1, 15, hour, i * 5, 0).unwrap());
            }
        }
        let pattern = WorkPatternLearner::default().learn(&commits(&times)).unwrap();
        assert_eq!(pattern.work_hours.start.to_string(), "10:00");
        assert_eq!(pattern.work_hours.end.to_string(), "18:00");
        assert_eq!(pattern.tier, ConfidenceTier::Medium);
    }

    #[test]
    fn window_end_is_capped_at_midnight() {
        let times: Vec<_> = (0..3)
            .map(|i| Utc.with_ymd_and_hms(2025, 1, 15, 22, i, 0).unwrap())
            .collect();
        let pattern = WorkPatternLearner::default().learn(&commits(&times)).unwrap();
        assert_eq!(pattern.work_hours.start.to_string(), "22:00");
        assert_eq!(pattern.work_hours.end, TimeOfDay::END_OF_DAY);
    }

    #[test]
    fn weekend_days_only_when_observed() {
        let sat = Utc.with_ymd_and_hms(2025, 1, 18, 10, 0, 0).unwrap();
        let pattern = WorkPatternLearner::default()
            .learn(&commits(&[ts(0), sat]))
            .unwrap();
        assert!(pattern.work_days.contains(Weekday::Sat));
        assert!(pattern.work_days.contains(Weekday::Wed));
        assert!(!pattern.exclude_weekends());

        let weekend_only = WorkPatternLearner::default().learn(&commits(&[sat])).unwrap();
        assert_eq!(weekend_only.work_days.len(), 6);
    }

    #[test]
    fn typical_gap_is_upper_median() {
        let pattern = WorkPatternLearner::default()
            .learn(&commits(&[ts(0), ts(10), ts(30), ts(70)]))
            .unwrap();
        // Gaps 10, 20, 40 -> median 20.
        assert_eq!(pattern.typical_gap_minutes, 20);

        let even = WorkPatternLearner::default()
            .learn(&commits(&[ts(0), ts(10), ts(30)]))
            .unwrap();
        // Gaps 10, 20 -> upper median 20.
        assert_eq!(even.typical_gap_minutes, 20);
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(ConfidenceTier::for_sample_size(9), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::for_sample_size(10), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::for_sample_size(49), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::for_sample_size(50), ConfidenceTier::High);
        assert!(ConfidenceTier::High.confidence() > ConfidenceTier::Medium.confidence());
    }

    #[test]
    fn matches_checks_hours_and_days() {
        let pattern = WorkPatternLearner::default()
            .learn(&commits(&[ts(0), ts(30)]))
            .unwrap();
        assert!(pattern.matches(ts(60)));
        assert!(!pattern.matches(ts(-60)));
        assert!(!pattern.matches(ts(8 * 60))); // 17:00 is past the window
        let thursday = ts(24 * 60);
        assert!(!pattern.matches(thursday));
    }
}
