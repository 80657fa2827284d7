//! Simulation configuration loading and validation.
//!
//! A configuration file is TOML (`.toml`) or JSON (any other extension).
//! Every field has a default, so an empty file describes a five-message urban
//! run with ten nodes and adaptive tuning enabled.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::simulation::types::Environment;

/// Smallest population that allows a distinct source and destination.
pub const MIN_NODE_COUNT: usize = 2;
/// Largest supported population.
pub const MAX_NODE_COUNT: usize = 100;

/// Error type for configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which run loop the driver executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", rename_all_fields = "kebab-case")]
pub enum RunMode {
    /// Fixed number of random sends.
    Messages {
        #[serde(default = "default_message_count")]
        count: usize,
    },
    /// Wall-clock paced run with node mobility.
    Mobility {
        #[serde(default = "default_duration_secs")]
        duration_secs: f64,
        #[serde(default = "default_interval_secs")]
        interval_secs: f64,
    },
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Messages {
            count: default_message_count(),
        }
    }
}

fn default_message_count() -> usize {
    5
}

fn default_duration_secs() -> f64 {
    30.0
}

fn default_interval_secs() -> f64 {
    1.0
}

fn default_node_count() -> usize {
    10
}

fn default_adaptive() -> bool {
    true
}

/// Where to write the final metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExportConfig {
    pub csv_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationConfig {
    #[serde(default = "default_node_count")]
    pub node_count: usize,
    /// Edge length of the square deployment area; defaults per environment.
    #[serde(default)]
    pub area_size: Option<f64>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_adaptive")]
    pub adaptive: bool,
    /// Seed for the simulation RNG; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub run: RunMode,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: default_node_count(),
            area_size: None,
            environment: Environment::default(),
            adaptive: default_adaptive(),
            seed: None,
            run: RunMode::default(),
            export: ExportConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load and validate a configuration file.
    ///
    /// # Parameters
    ///
    /// * `path` - `.toml` files are parsed as TOML, everything else as JSON
    ///
    /// # Returns
    ///
    /// The validated configuration, or the first read, parse or validation error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(format!("{}: {}", path.display(), e)))?;
        let is_toml = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        let config = if is_toml { Self::from_toml_str(&content)? } else { Self::from_json_str(&content)? };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Reject values the orchestrator cannot clamp into shape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(area) = self.area_size {
            if !area.is_finite() || area <= 0.0 {
                return Err(ConfigError::ValidationError(format!("area-size must be positive, got {}", area)));
            }
        }
        self.run.mobility_timing()?;
        Ok(())
    }

    /// Area size after applying the environment default.
    pub fn effective_area_size(&self) -> f64 {
        self.area_size.unwrap_or_else(|| self.environment.default_area_size())
    }

    /// Node count clamped into the supported range, before any environment cap.
    pub fn clamped_node_count(&self) -> usize {
        let clamped = self.node_count.clamp(MIN_NODE_COUNT, MAX_NODE_COUNT);
        if clamped != self.node_count {
            log::warn!("node-count {} out of range, using {}", self.node_count, clamped);
        }
        clamped
    }
}

impl RunMode {
    /// Duration and interval of a mobility run as `Duration`s.
    ///
    /// # Returns
    ///
    /// `None` for a messages run, or an error when either value is negative,
    /// not finite, or too large for a `Duration`.
    pub fn mobility_timing(&self) -> Result<Option<(Duration, Duration)>, ConfigError> {
        match *self {
            RunMode::Mobility { duration_secs, interval_secs } => {
                Ok(Some((seconds("duration-secs", duration_secs)?, seconds("interval-secs", interval_secs)?)))
            }
            RunMode::Messages { .. } => Ok(None),
        }
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::ValidationError(format!("{} must be a non-negative number of seconds, got {} ({})", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.effective_area_size(), 100.0);
        assert_eq!(config.run, RunMode::Messages { count: 5 });
    }

    #[test]
    fn toml_with_mobility_run() {
        let content = r#"
            node-count = 12
            environment = "Indoor"
            adaptive = false
            seed = 42

            [run]
            mode = "mobility"
            duration-secs = 5.0

            [export]
            csv-path = "out/results.csv"
        "#;
        let config = SimulationConfig::from_toml_str(content).unwrap();
        assert_eq!(config.node_count, 12);
        assert_eq!(config.environment, Environment::Indoor);
        assert!(!config.adaptive);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.effective_area_size(), 50.0);
        assert_eq!(
            config.run,
            RunMode::Mobility {
                duration_secs: 5.0,
                interval_secs: 1.0
            }
        );
        assert_eq!(config.export.csv_path, Some(PathBuf::from("out/results.csv")));
        let (duration, interval) = config.run.mobility_timing().unwrap().unwrap();
        assert_eq!(duration, Duration::from_secs(5));
        assert_eq!(interval, Duration::from_secs(1));
    }

    #[test]
    fn json_config_parses() {
        let content = r#"{"node-count": 3, "environment": "free_space", "area-size": 250.0, "run": {"mode": "messages", "count": 40}}"#;
        let config = SimulationConfig::from_json_str(content).unwrap();
        assert_eq!(config.environment, Environment::FreeSpace);
        assert_eq!(config.effective_area_size(), 250.0);
        assert_eq!(config.run, RunMode::Messages { count: 40 });
    }

    #[test]
    fn unknown_environment_falls_back_to_urban() {
        let config = SimulationConfig::from_toml_str("environment = \"swamp\"").unwrap();
        assert_eq!(config.environment, Environment::Urban);
    }

    #[test]
    fn validation_rejects_bad_area() {
        let config = SimulationConfig {
            area_size: Some(0.0),
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        let config = SimulationConfig {
            area_size: Some(f64::NAN),
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_timing() {
        let config = SimulationConfig::from_toml_str("[run]\nmode = \"mobility\"\nduration-secs = 1e20").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        assert!(config.run.mobility_timing().is_err());

        for (duration_secs, interval_secs) in [(-1.0, 1.0), (10.0, f64::INFINITY), (10.0, f64::NAN)] {
            let config = SimulationConfig {
                run: RunMode::Mobility { duration_secs, interval_secs },
                ..SimulationConfig::default()
            };
            assert!(config.validate().is_err());
        }
        assert_eq!(RunMode::default().mobility_timing().unwrap(), None);
    }

    #[test]
    fn node_count_is_clamped() {
        let mut config = SimulationConfig {
            node_count: 1,
            ..SimulationConfig::default()
        };
        assert_eq!(config.clamped_node_count(), MIN_NODE_COUNT);
        config.node_count = 500;
        assert_eq!(config.clamped_node_count(), MAX_NODE_COUNT);
    }

    #[test]
    fn load_reports_missing_file() {
        let missing = std::env::temp_dir().join("lorampp-no-such-config.toml");
        assert!(matches!(SimulationConfig::load(&missing), Err(ConfigError::FileReadError(_))));
    }

    #[test]
    fn load_reads_json_file() {
        let path = std::env::temp_dir().join(format!("lorampp-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"node-count": 4, "seed": 7}"#).unwrap();
        let config = SimulationConfig::load(&path).unwrap();
        assert_eq!(config.node_count, 4);
        assert_eq!(config.seed, Some(7));
        let _ = fs::remove_file(&path);
    }
}
