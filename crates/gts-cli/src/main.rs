use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gts_cli::commands::{generate, holidays, patterns, util};
use gts_cli::{Cli, Commands, Config, HistoryArgs};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Handles `--print-format`; returns true when nothing else should run.
fn print_format(history: &HistoryArgs) -> bool {
    if history.print_format {
        println!("{}", util::log_command_hint());
    }
    history.print_format
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Generate {
            history,
            learn_patterns,
            json,
        }) => {
            if print_format(history) {
                return Ok(());
            }
            let config = load_config(cli.config.as_deref())?;
            generate::run(&config, history, *learn_patterns, *json)?;
        }
        Some(Commands::Patterns { history, json }) => {
            if print_format(history) {
                return Ok(());
            }
            let config = load_config(cli.config.as_deref())?;
            patterns::run(&config, history, *json)?;
        }
        Some(Commands::Holidays {
            year,
            country,
            region,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            holidays::run(&config, *year, country.as_deref(), region.as_deref(), *json)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
