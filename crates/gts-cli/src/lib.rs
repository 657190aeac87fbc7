//! Git timesheet CLI library.
//!
//! This crate provides the CLI interface for estimating timesheets from git history.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, HistoryArgs};
pub use config::Config;
