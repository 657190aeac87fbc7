//! The `patterns` command: show what would be learned from history.

use std::fmt::Write;

use anyhow::Result;
use gts_core::commit::normalize;
use gts_core::{Commit, LearnedPattern, WorkPatternLearner};

use super::util::load_history;
use crate::Config;
use crate::cli::HistoryArgs;

/// Runs the patterns command.
pub fn run(config: &Config, history: &HistoryArgs, json: bool) -> Result<()> {
    let loaded = load_history(history, config.concurrency)?;
    let commits: Vec<Commit> = loaded
        .records
        .into_iter()
        .filter_map(|record| match normalize(record) {
            Ok(commit) => Some(commit),
            Err(e) => {
                tracing::debug!(error = %e, "skipping invalid commit record");
                None
            }
        })
        .collect();

    let learner = WorkPatternLearner::new(config.grouping.utc_offset_minutes);
    let Some(pattern) = learner.learn(&commits) else {
        println!("No commits found.");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&pattern)?);
    } else {
        print!("{}", format_pattern(&pattern));
    }
    Ok(())
}

/// Formats a learned pattern for the terminal.
pub fn format_pattern(pattern: &LearnedPattern) -> String {
    let mut output = String::new();
    let days: Vec<String> = pattern.work_days.iter().map(|d| d.to_string()).collect();

    writeln!(
        output,
        "WORK PATTERN ({} commits, {:?} confidence {})",
        pattern.sample_size, pattern.tier, pattern.confidence
    )
    .unwrap();
    writeln!(output, "Work hours:   {} UTC", pattern.work_hours).unwrap();
    writeln!(output, "Work days:    {}", days.join(", ")).unwrap();
    writeln!(output, "Typical gap:  {}m", pattern.typical_gap_minutes).unwrap();
    writeln!(
        output,
        "Weekends:     {}",
        if pattern.exclude_weekends() { "excluded" } else { "included" }
    )
    .unwrap();
    output
}
