//! The `generate` command: commits in, timesheet out.

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use gts_core::{GenerateOptions, Period, Timesheet, TimesheetGenerator};

use super::util::{format_minutes, load_history};
use crate::Config;
use crate::cli::HistoryArgs;

/// Longest session summary shown in text output.
const SUMMARY_WIDTH: usize = 60;

/// Runs the generate command.
pub fn run(config: &Config, history: &HistoryArgs, learn_patterns: bool, json: bool) -> Result<()> {
    let mut timesheet_config = config.timesheet();
    timesheet_config.grouping.learn_patterns |= learn_patterns;
    let generator = TimesheetGenerator::new(timesheet_config).context("invalid configuration")?;

    let loaded = load_history(history, config.concurrency)?;
    if loaded.records.is_empty() {
        println!("No commits found.");
        return Ok(());
    }

    let period = loaded.since.map(|since| Period {
        start: since.date_naive(),
        end: loaded.until.unwrap_or_else(Utc::now).date_naive(),
    });
    let options = GenerateOptions {
        period,
        upstream_dropped: loaded.dropped,
    };
    let timesheet = generator.generate(loaded.records, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&timesheet)?);
    } else {
        print!("{}", format_timesheet(&timesheet));
    }
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Formats a timesheet for the terminal.
pub fn format_timesheet(sheet: &Timesheet) -> String {
    let mut output = String::new();

    writeln!(output, "TIMESHEET: {} to {}", sheet.period.start, sheet.period.end).unwrap();
    let repos = &sheet.repositories;
    match (&repos.repository, &repos.repo_type) {
        (Some(name), Some(kind)) => writeln!(output, "Repository: {name} ({kind})").unwrap(),
        (Some(name), None) => writeln!(output, "Repository: {name}").unwrap(),
        _ if !repos.repositories.is_empty() => {
            writeln!(output, "Repositories: {}", repos.repositories.join(", ")).unwrap();
        }
        _ => {}
    }

    writeln!(output).unwrap();
    writeln!(output, "SESSIONS").unwrap();
    writeln!(output, "────────").unwrap();
    if sheet.sessions.is_empty() {
        writeln!(output, "(no sessions after filtering)").unwrap();
    }
    for s in &sheet.sessions {
        let commits = if s.commit_count == 1 { "commit" } else { "commits" };
        writeln!(
            output,
            "  #{:<3} {}  {}-{}  {:>7}  {:>2} {:<7}  {}",
            s.id,
            s.date,
            s.start_time.format("%H:%M"),
            s.end_time.format("%H:%M"),
            format_minutes(s.duration_minutes),
            s.commit_count,
            commits,
            truncate(&s.summary, SUMMARY_WIDTH),
        )
        .unwrap();
    }

    if !sheet.by_project.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "BY PROJECT").unwrap();
        writeln!(output, "──────────").unwrap();
        for (name, rollup) in &sheet.by_project {
            writeln!(
                output,
                "  {name:<20} {:>8}  ({} commits)",
                format_minutes(rollup.minutes),
                rollup.commits
            )
            .unwrap();
        }
    }

    if !sheet.by_ticket.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "BY TICKET").unwrap();
        writeln!(output, "─────────").unwrap();
        for (ticket, count) in &sheet.by_ticket {
            writeln!(output, "  {ticket:<20} {count} commits").unwrap();
        }
    }

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(
        output,
        "Total time:  {} ({:.2}h)",
        format_minutes(sheet.total_minutes),
        sheet.total_hours
    )
    .unwrap();
    writeln!(output, "Sessions:    {}", sheet.total_sessions).unwrap();
    writeln!(output, "Commits:     {}", sheet.total_commits).unwrap();

    let d = &sheet.diagnostics;
    if d.records_dropped > 0 {
        writeln!(output, "Skipped:     {} invalid records", d.records_dropped).unwrap();
    }
    if d.commits_filtered > 0 {
        writeln!(
            output,
            "Filtered:    {} commits in {} sessions (weekends, holidays, off hours)",
            d.commits_filtered, d.sessions_filtered
        )
        .unwrap();
    }
    if let Some(pattern) = &d.learned_pattern {
        let applied = if d.pattern_applied { "applied" } else { "not applied" };
        writeln!(
            output,
            "Pattern:     {} UTC, gap {}m, confidence {} ({applied})",
            pattern.work_hours, pattern.typical_gap_minutes, pattern.confidence
        )
        .unwrap();
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone};
    use gts_core::{RawCommit, TimesheetConfig};
    use insta::assert_snapshot;

    use super::*;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn record(hash: &str, minutes: i64, message: &str, branch: &str) -> RawCommit {
        RawCommit {
            hash: Some(hash.to_string()),
            author_name: Some("Ada".to_string()),
            date: Some(ts(minutes).into()),
            message: Some(message.to_string()),
            branches: vec![branch.to_string()],
            repo: Some("web".to_string()),
            repo_type: Some("local".to_string()),
            ..RawCommit::default()
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer summary", 10), "a longe...");
    }

    #[test]
    fn test_format_timesheet() {
        let records = vec![
            record("aaaaaaa", 0, "PROJ-1 start login form", "feature/auth"),
            record("bbbbbbb", 20, "PROJ-1 finish login form", "feature/auth"),
            record("ccccccc", 240, "Tidy", "main"),
        ];
        let sheet = TimesheetGenerator::new(TimesheetConfig::default())
            .unwrap()
            .generate(records, &GenerateOptions::default())
            .unwrap();

        assert_snapshot!(format_timesheet(&sheet), @r"
        TIMESHEET: 2025-01-15 to 2025-01-15
        Repository: web (local)

        SESSIONS
        ────────
          #1   2025-01-15  09:00-09:20      16m   2 commits  PROJ-1 start login form; PROJ-1 finish login form
          #2   2025-01-15  13:00-13:00      15m   1 commit   Tidy

        BY PROJECT
        ──────────
          auth                      16m  (2 commits)

        BY TICKET
        ─────────
          PROJ-1               2 commits

        SUMMARY
        ───────
        Total time:  31m (0.52h)
        Sessions:    2
        Commits:     3
        ");
    }
}
