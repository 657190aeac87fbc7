//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use gts_core::{DEFAULT_CONCURRENCY, EstimatorConfig, GroupingConfig, ProjectMapping, TimesheetConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
///
/// Sources, later ones winning: built-in defaults, `<config dir>/gts/config.toml`,
/// the `--config` file, then `GTS_*` environment variables with `__` between
/// nested keys (e.g. `GTS_GROUPING__GAP_THRESHOLD_MINUTES=45`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grouping: GroupingConfig,
    pub estimation: EstimatorConfig,
    pub projects: BTreeMap<String, ProjectMapping>,

    /// Repositories read in parallel.
    /// Default: 5.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        let timesheet = TimesheetConfig::default();
        Self {
            grouping: timesheet.grouping,
            estimation: timesheet.estimation,
            projects: timesheet.projects,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (GTS_*)
        figment = figment.merge(Env::prefixed("GTS_").split("__"));

        figment.extract()
    }

    /// The pipeline configuration part.
    pub fn timesheet(&self) -> TimesheetConfig {
        TimesheetConfig {
            grouping: self.grouping.clone(),
            estimation: self.estimation.clone(),
            projects: self.projects.clone(),
        }
    }
}

/// Returns the platform-specific config directory for gts.
///
/// On Linux: `~/.config/gts`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("gts"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_dirs_config_path_ends_with_gts() {
        let path = dirs_config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "gts");
    }

    #[test]
    fn test_default_config_matches_pipeline_defaults() {
        let config = Config::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.grouping.gap_threshold_minutes, 30);
        assert_eq!(config.timesheet(), TimesheetConfig::default());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
concurrency = 2

[grouping]
gap_threshold_minutes = 45
exclude_weekends = false
work_hours = {{ start = "08:00", end = "16:30" }}
custom_holidays = ["2025-03-14"]

[estimation]
max_session_minutes = 240.0

[estimation.complexity_multipliers]
refactor = 3.0

[projects.billing]
files = ["billing/**"]
keywords = ["invoice"]
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.grouping.gap_threshold_minutes, 45);
        assert!(!config.grouping.exclude_weekends);
        assert_eq!(config.grouping.work_hours.to_string(), "08:00-16:30");
        assert_eq!(config.grouping.custom_holidays.len(), 1);
        // Untouched keys keep their defaults.
        assert_eq!(config.grouping.merge_gap_minutes, 60);
        assert!((config.estimation.max_session_minutes - 240.0).abs() < f64::EPSILON);
        assert!((config.estimation.complexity_multipliers.refactor - 3.0).abs() < f64::EPSILON);
        assert!((config.estimation.complexity_multipliers.test - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.projects["billing"].keywords, vec!["invoice".to_string()]);
    }

    #[test]
    fn test_invalid_config_value_is_an_error() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[grouping]\nwork_hours = {{ start = \"25:00\", end = \"17:00\" }}").unwrap();
        assert!(Config::load_from(Some(file.path())).is_err());
    }
}
