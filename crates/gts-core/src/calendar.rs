//! Calendar helpers: time-of-day windows, weekday sets and calendar days.
//!
//! Calendar-day, weekend and holiday decisions are made on the commit instant
//! shifted by a fixed UTC offset. Work-hour comparisons always use UTC so they
//! do not depend on the machine's local timezone.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A time of day with minute precision, `00:00` through `24:00` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const END_OF_DAY: Self = Self(MINUTES_PER_DAY);

    /// Build from hours and minutes. `24:00` is allowed as an end bound.
    pub fn from_hm(hour: u16, minute: u16) -> Result<Self, ValidationError> {
        let total = hour.checked_mul(60).and_then(|h| h.checked_add(minute));
        match total {
            Some(total) if minute < 60 && total <= MINUTES_PER_DAY => Ok(Self(total)),
            _ => Err(ValidationError::InvalidTimeOfDay {
                value: format!("{hour:02}:{minute:02}"),
            }),
        }
    }

    /// Build from minutes since midnight, saturating at `24:00`.
    pub fn from_minutes(minutes: u32) -> Self {
        Self(u16::try_from(minutes).map_or(MINUTES_PER_DAY, |m| m.min(MINUTES_PER_DAY)))
    }

    /// Parse `HH:mm`.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTimeOfDay {
            value: value.to_string(),
        };
        let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }

    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// UTC time of day of an instant.
    pub fn of_instant(dt: DateTime<Utc>) -> Self {
        // hour() < 24 and minute() < 60, so this never saturates.
        Self::from_minutes(dt.hour() * 60 + dt.minute())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

/// A daily work-hour window, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHours {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Default for WorkHours {
    fn default() -> Self {
        Self {
            start: TimeOfDay(9 * 60), // 09:00
            end: TimeOfDay(17 * 60),  // 17:00
        }
    }
}

impl WorkHours {
    pub const fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Whether the UTC time of day of `dt` falls inside the window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        let t = TimeOfDay::of_instant(dt);
        self.start <= t && t <= self.end
    }

    pub const fn is_valid(&self) -> bool {
        self.start.0 <= self.end.0
    }
}

impl fmt::Display for WorkHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A set of weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: Self = Self(0);

    /// Monday through Friday.
    pub fn weekdays() -> Self {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]
        .into_iter()
        .collect()
    }

    const fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    pub const fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub const fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Whether Saturday or Sunday is in the set.
    pub const fn includes_weekend(self) -> bool {
        self.contains(Weekday::Sat) || self.contains(Weekday::Sun)
    }

    /// Days in Monday-first order.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        (0..7u8)
            .filter(move |i| self.0 & (1 << i) != 0)
            .filter_map(|i| Weekday::try_from(i).ok())
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Weekday>> for WeekdaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<WeekdaySet> for Vec<Weekday> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().collect()
    }
}

/// Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Calendar day of `dt` at a fixed UTC offset, in minutes east of UTC.
///
/// Returns `None` when the shifted instant leaves chrono's representable range.
pub fn calendar_date(dt: DateTime<Utc>, utc_offset_minutes: i32) -> Option<NaiveDate> {
    dt.checked_add_signed(Duration::minutes(i64::from(utc_offset_minutes)))
        .map(|shifted| shifted.date_naive())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_and_formats_time_of_day() {
        assert_eq!(TimeOfDay::parse("09:00").unwrap().minutes(), 540);
        assert_eq!(TimeOfDay::parse("9:30").unwrap().minutes(), 570);
        assert_eq!(TimeOfDay::parse("24:00").unwrap(), TimeOfDay::END_OF_DAY);
        assert_eq!(TimeOfDay::parse("17:05").unwrap().to_string(), "17:05");
    }

    #[test]
    fn rejects_bad_time_of_day() {
        for bad in ["", "9", "25:00", "24:01", "12:60", "ab:cd", "12:5", "123:00"] {
            assert!(TimeOfDay::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn work_hours_inclusive_in_utc() {
        let hours = WorkHours::default();
        let at = |h, m| Utc.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap();
        assert!(hours.contains(at(9, 0)));
        assert!(hours.contains(at(17, 0)));
        assert!(hours.contains(at(12, 30)));
        assert!(!hours.contains(at(8, 59)));
        assert!(!hours.contains(at(17, 1)));
    }

    #[test]
    fn work_hours_serde_uses_hh_mm() {
        let json = serde_json::to_string(&WorkHours::default()).unwrap();
        assert_eq!(json, r#"{"start":"09:00","end":"17:00"}"#);
        let parsed: WorkHours = serde_json::from_str(r#"{"start":"08:30","end":"18:00"}"#).unwrap();
        assert_eq!(parsed.start.minutes(), 510);
        assert!(serde_json::from_str::<WorkHours>(r#"{"start":"8h","end":"18:00"}"#).is_err());
    }

    #[test]
    fn weekday_set_basics() {
        let set = WeekdaySet::weekdays();
        assert_eq!(set.len(), 5);
        assert!(set.contains(Weekday::Wed));
        assert!(!set.includes_weekend());

        let mut with_sat = set;
        with_sat.insert(Weekday::Sat);
        assert!(with_sat.includes_weekend());
        assert_eq!(with_sat.iter().last(), Some(Weekday::Sat));
    }

    #[test]
    fn weekday_set_serde_round_trip() {
        let set: WeekdaySet = [Weekday::Mon, Weekday::Sun].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Mon","Sun"]"#);
        let back: WeekdaySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn calendar_date_honours_offset() {
        let late = Utc.with_ymd_and_hms(2025, 1, 17, 23, 30, 0).unwrap();
        assert_eq!(calendar_date(late, 0), NaiveDate::from_ymd_opt(2025, 1, 17));
        assert_eq!(calendar_date(late, 60), NaiveDate::from_ymd_opt(2025, 1, 18));
        assert_eq!(calendar_date(late, -600), NaiveDate::from_ymd_opt(2025, 1, 17));
    }

    #[test]
    fn weekend_detection() {
        assert!(is_weekend(NaiveDate::from_ymd_opt(2025, 1, 18).unwrap()));
        assert!(is_weekend(NaiveDate::from_ymd_opt(2025, 1, 19).unwrap()));
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()));
    }
}
