//! The `holidays` command.

use std::fmt::Write;

use anyhow::Result;
use chrono::{Datelike, Utc};
use gts_core::{Holiday, HolidayChecker};

use crate::Config;

/// Runs the holidays command. Flags override the configured country and region.
pub fn run(
    config: &Config,
    year: Option<i32>,
    country: Option<&str>,
    region: Option<&str>,
    json: bool,
) -> Result<()> {
    let grouping = &config.grouping;
    let country = country.unwrap_or(&grouping.holiday_country);
    let region = region.or(grouping.holiday_region.as_deref());
    let year = year.unwrap_or_else(|| Utc::now().year());

    let holidays = HolidayChecker::new(country, region, &grouping.custom_holidays).holidays(year);
    if json {
        println!("{}", serde_json::to_string_pretty(&holidays)?);
    } else {
        print!("{}", format_holidays(&holidays));
    }
    Ok(())
}

pub fn format_holidays(holidays: &[Holiday]) -> String {
    if holidays.is_empty() {
        return "No holidays.\n".to_string();
    }
    let mut output = String::new();
    for h in holidays {
        if h.kind == "public" {
            writeln!(output, "{}  {}  {}", h.date, h.date.weekday(), h.name).unwrap();
        } else {
            writeln!(output, "{}  {}  {} ({})", h.date, h.date.weekday(), h.name, h.kind).unwrap();
        }
    }
    output
}
