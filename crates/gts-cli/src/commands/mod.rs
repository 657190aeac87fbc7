//! CLI subcommand implementations.

pub mod generate;
pub mod holidays;
pub mod patterns;
pub mod util;
