//! Public holiday calendars.
//!
//! Built-in rules cover US, CA, GB, DE and FR with a handful of regions.
//! Caller-supplied custom dates are always honoured, even for countries
//! without built-in rules.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

/// Anything that can answer "is this calendar day a holiday?".
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// A named holiday.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    /// `public`, `observed` or `custom`.
    pub kind: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Country {
    Us,
    Ca,
    Gb,
    De,
    Fr,
}

impl Country {
    fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "US" => Some(Self::Us),
            "CA" => Some(Self::Ca),
            "GB" | "UK" => Some(Self::Gb),
            "DE" => Some(Self::De),
            "FR" => Some(Self::Fr),
            _ => None,
        }
    }
}

/// Holiday calendar for one country/region plus custom dates.
#[derive(Debug, Clone)]
pub struct HolidayChecker {
    country: Option<Country>,
    region: Option<String>,
    custom: BTreeSet<NaiveDate>,
}

impl HolidayChecker {
    /// Create a checker. Regions may be given bare (`MA`) or prefixed (`US-MA`).
    ///
    /// Unknown countries log a warning and fall back to custom dates only.
    pub fn new(country: &str, region: Option<&str>, custom: &[NaiveDate]) -> Self {
        let parsed = Country::parse(country);
        if parsed.is_none() && !country.trim().is_empty() {
            tracing::warn!(
                country,
                "no built-in holiday rules for country, using custom holidays only"
            );
        }
        let region = region
            .map(|r| {
                let r = r.trim().to_ascii_uppercase();
                match r.split_once('-') {
                    Some((_, sub)) => sub.to_string(),
                    None => r,
                }
            })
            .filter(|r| !r.is_empty());
        Self {
            country: parsed,
            region,
            custom: custom.iter().copied().collect(),
        }
    }

    /// Only the given custom dates.
    pub fn custom_only(custom: &[NaiveDate]) -> Self {
        Self {
            country: None,
            region: None,
            custom: custom.iter().copied().collect(),
        }
    }

    fn in_region(&self, codes: &[&str]) -> bool {
        self.region
            .as_deref()
            .is_some_and(|r| codes.contains(&r))
    }

    /// All holidays falling in `year`, sorted by date.
    pub fn holidays(&self, year: i32) -> Vec<Holiday> {
        let mut out: Vec<Holiday> = match self.country {
            Some(Country::Us) => self.us(year),
            Some(Country::Ca) => self.ca(year),
            Some(Country::Gb) => self.gb(year),
            Some(Country::De) => self.de(year),
            Some(Country::Fr) => fr(year),
            None => Vec::new(),
        };
        // Observed days can spill into the neighbouring years.
        out.retain(|h| h.date.year() == year);
        out.extend(
            self.custom
                .iter()
                .filter(|d| d.year() == year)
                .map(|&date| Holiday {
                    date,
                    name: "Custom Holiday".to_string(),
                    kind: "custom",
                }),
        );
        out.sort();
        out
    }

    /// Holidays between `start` and `end`, inclusive.
    pub fn holidays_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<Holiday> {
        (start.year()..=end.year())
            .flat_map(|year| self.holidays(year))
            .filter(|h| h.date >= start && h.date <= end)
            .collect()
    }

    fn us(&self, year: i32) -> Vec<Holiday> {
        let mut out = Vec::new();
        for y in [year - 1, year, year + 1] {
            us_observed(&mut out, date(y, 1, 1), "New Year's Day");
            if y >= 2021 {
                us_observed(&mut out, date(y, 6, 19), "Juneteenth");
            }
            us_observed(&mut out, date(y, 7, 4), "Independence Day");
            us_observed(&mut out, date(y, 11, 11), "Veterans Day");
            us_observed(&mut out, date(y, 12, 25), "Christmas Day");
        }
        push(&mut out, nth(year, 1, Weekday::Mon, 3), "Martin Luther King Jr. Day");
        push(&mut out, nth(year, 2, Weekday::Mon, 3), "Presidents' Day");
        push(&mut out, last(year, 5, Weekday::Mon), "Memorial Day");
        push(&mut out, nth(year, 9, Weekday::Mon, 1), "Labor Day");
        push(&mut out, nth(year, 10, Weekday::Mon, 2), "Columbus Day");
        push(&mut out, nth(year, 11, Weekday::Thu, 4), "Thanksgiving Day");
        if self.in_region(&["MA", "ME"]) {
            push(&mut out, nth(year, 4, Weekday::Mon, 3), "Patriots' Day");
        }
        out
    }

    fn ca(&self, year: i32) -> Vec<Holiday> {
        let mut out = Vec::new();
        push(&mut out, date(year, 1, 1), "New Year's Day");
        push(&mut out, easter_offset(year, -2), "Good Friday");
        push(&mut out, victoria_day(year), "Victoria Day");
        push(&mut out, date(year, 7, 1), "Canada Day");
        push(&mut out, nth(year, 9, Weekday::Mon, 1), "Labour Day");
        push(&mut out, nth(year, 10, Weekday::Mon, 2), "Thanksgiving");
        push(&mut out, date(year, 12, 25), "Christmas Day");
        push(&mut out, date(year, 12, 26), "Boxing Day");
        if self.in_region(&["QC"]) {
            push(&mut out, date(year, 6, 24), "Saint-Jean-Baptiste Day");
        }
        out
    }

    fn gb(&self, year: i32) -> Vec<Holiday> {
        let scotland = self.in_region(&["SCT"]);
        let mut fixed = vec![(date(year, 1, 1), "New Year's Day")];
        if scotland {
            fixed.push((date(year, 1, 2), "2nd January"));
            fixed.push((date(year, 11, 30), "St Andrew's Day"));
        }
        fixed.push((date(year, 12, 25), "Christmas Day"));
        fixed.push((date(year, 12, 26), "Boxing Day"));

        let mut out = Vec::new();
        push(&mut out, easter_offset(year, -2), "Good Friday");
        if !scotland {
            push(&mut out, easter_offset(year, 1), "Easter Monday");
        }
        push(&mut out, nth(year, 5, Weekday::Mon, 1), "Early May Bank Holiday");
        push(&mut out, last(year, 5, Weekday::Mon), "Spring Bank Holiday");
        let summer = if scotland {
            nth(year, 8, Weekday::Mon, 1)
        } else {
            last(year, 8, Weekday::Mon)
        };
        push(&mut out, summer, "Summer Bank Holiday");

        // Weekend fixed days move to the next free weekday.
        let mut taken: BTreeSet<NaiveDate> = fixed.iter().filter_map(|(d, _)| *d).collect();
        for (day, name) in fixed {
            let Some(day) = day else { continue };
            push(&mut out, Some(day), name);
            if crate::calendar::is_weekend(day) {
                let mut sub = day;
                while crate::calendar::is_weekend(sub) || taken.contains(&sub) {
                    sub += Duration::days(1);
                }
                taken.insert(sub);
                out.push(Holiday {
                    date: sub,
                    name: format!("{name} (substitute day)"),
                    kind: "observed",
                });
            }
        }
        out
    }

    fn de(&self, year: i32) -> Vec<Holiday> {
        let mut out = Vec::new();
        push(&mut out, date(year, 1, 1), "Neujahr");
        push(&mut out, easter_offset(year, -2), "Karfreitag");
        push(&mut out, easter_offset(year, 1), "Ostermontag");
        push(&mut out, date(year, 5, 1), "Tag der Arbeit");
        push(&mut out, easter_offset(year, 39), "Christi Himmelfahrt");
        push(&mut out, easter_offset(year, 50), "Pfingstmontag");
        push(&mut out, date(year, 10, 3), "Tag der Deutschen Einheit");
        push(&mut out, date(year, 12, 25), "Erster Weihnachtstag");
        push(&mut out, date(year, 12, 26), "Zweiter Weihnachtstag");

        if self.in_region(&["BW", "BY", "ST"]) {
            push(&mut out, date(year, 1, 6), "Heilige Drei Könige");
        }
        if self.in_region(&["BE"]) && year >= 2019 {
            push(&mut out, date(year, 3, 8), "Internationaler Frauentag");
        }
        if self.in_region(&["BW", "BY", "HE", "NW", "RP", "SL"]) {
            push(&mut out, easter_offset(year, 60), "Fronleichnam");
        }
        if self.in_region(&["SL"]) {
            push(&mut out, date(year, 8, 15), "Mariä Himmelfahrt");
        }
        if self.in_region(&["BB", "HB", "HH", "MV", "NI", "SH", "SN", "ST", "TH"]) {
            push(&mut out, date(year, 10, 31), "Reformationstag");
        }
        if self.in_region(&["BW", "BY", "NW", "RP", "SL"]) {
            push(&mut out, date(year, 11, 1), "Allerheiligen");
        }
        if self.in_region(&["SN"]) {
            push(&mut out, repentance_day(year), "Buß- und Bettag");
        }
        out
    }
}

fn fr(year: i32) -> Vec<Holiday> {
    let mut out = Vec::new();
    push(&mut out, date(year, 1, 1), "Jour de l'an");
    push(&mut out, easter_offset(year, 1), "Lundi de Pâques");
    push(&mut out, date(year, 5, 1), "Fête du travail");
    push(&mut out, date(year, 5, 8), "Victoire 1945");
    push(&mut out, easter_offset(year, 39), "Ascension");
    push(&mut out, easter_offset(year, 50), "Lundi de Pentecôte");
    push(&mut out, date(year, 7, 14), "Fête nationale");
    push(&mut out, date(year, 8, 15), "Assomption");
    push(&mut out, date(year, 11, 1), "Toussaint");
    push(&mut out, date(year, 11, 11), "Armistice 1918");
    push(&mut out, date(year, 12, 25), "Noël");
    out
}

impl HolidayCalendar for HolidayChecker {
    fn is_holiday(&self, day: NaiveDate) -> bool {
        if self.custom.contains(&day) {
            return true;
        }
        self.country.is_some() && self.holidays(day.year()).iter().any(|h| h.date == day)
    }
}

fn push(out: &mut Vec<Holiday>, day: Option<NaiveDate>, name: &str) {
    if let Some(date) = day {
        out.push(Holiday {
            date,
            name: name.to_string(),
            kind: "public",
        });
    }
}

/// US federal rule: Saturday holidays are observed Friday, Sunday ones Monday.
fn us_observed(out: &mut Vec<Holiday>, day: Option<NaiveDate>, name: &str) {
    let Some(day) = day else { return };
    push(out, Some(day), name);
    let observed = match day.weekday() {
        Weekday::Sat => day - Duration::days(1),
        Weekday::Sun => day + Duration::days(1),
        _ => return,
    };
    out.push(Holiday {
        date: observed,
        name: format!("{name} (observed)"),
        kind: "observed",
    });
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn nth(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        date(year + 1, 1, 1)
    } else {
        date(year, month + 1, 1)
    }?;
    let mut day = first_of_next.pred_opt()?;
    while day.weekday() != weekday {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Last Monday on or before May 24.
fn victoria_day(year: i32) -> Option<NaiveDate> {
    let mut day = date(year, 5, 24)?;
    while day.weekday() != Weekday::Mon {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Wednesday before November 23.
fn repentance_day(year: i32) -> Option<NaiveDate> {
    let mut day = date(year, 11, 22)?;
    while day.weekday() != Weekday::Wed {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    date(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

fn easter_offset(year: i32, days: i64) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_add_signed(Duration::days(days))
}
