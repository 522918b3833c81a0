//! Fuzzing configuration.
//!
//! A configuration is loaded once from a JSON file, validated, and then
//! passed by reference to every component. Nothing reads it from global state.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generate::{ActionGenerator, MapGenerator, MapSize, Strategy, Tier};
use crate::harness::ActionDelivery;

/// Name of the log file created under `log_path`.
pub const LOG_FILE_NAME: &str = "fuzzer.log";

/// Output patterns that mark a run as crashed unless configured otherwise.
pub const DEFAULT_FAULT_SIGNATURES: [&str; 6] = [
    "Exception in thread",
    "panicked at",
    "Segmentation fault",
    "Traceback (most recent call last)",
    "core dumped",
    "AddressSanitizer",
];

/// Error type for loading and validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for this schema.
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// No target program was given.
    #[error("target_path must not be empty")]
    MissingTarget,
    /// Action scripts must hold at least one action.
    #[error("max_action_length must be at least 1")]
    ZeroActionLength,
    /// The execution timeout is not a positive number of seconds.
    #[error("timeout_secs must be a positive number, got {0}")]
    InvalidTimeout(f64),
    /// Tier 3 needs at least one player start.
    #[error("player_count must be at least 1 for tier 3")]
    ZeroPlayers,
    /// The maximum map cannot hold tier 3's required glyphs.
    #[error("max_map_size {size} cannot hold {required} required player and food cells")]
    MapTooSmall {
        /// Configured maximum size.
        size: MapSize,
        /// Cells tier 3 must place.
        required: usize,
    },
    /// An empty pattern would match every output.
    #[error("{field} must not contain empty patterns")]
    EmptyPattern {
        /// Name of the offending option.
        field: &'static str,
    },
}

/// Rules that recognize a graceful "input rejected" exit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RejectionRules {
    /// Exit codes the target uses to reject an input.
    pub exit_codes: Vec<i32>,
    /// Output fragments printed when an input is rejected (checked on exit code 0).
    pub patterns: Vec<String>,
}

/// Configuration for a fuzzing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FuzzConfig {
    /// Directory for `fuzzer.log`.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Directory for transient map files, saved cases and reports.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Target executable.
    pub target_path: PathBuf,

    /// Arguments placed before the map file path.
    #[serde(default)]
    pub target_args: Vec<String>,

    /// How the action script reaches the target.
    #[serde(default)]
    pub action_delivery: ActionDelivery,

    /// Run seed (None = random).
    #[serde(default)]
    pub seed: Option<u64>,

    /// Log per-iteration detail.
    #[serde(default)]
    pub verbose: bool,

    /// Largest map to generate, `[width, height]`.
    pub max_map_size: MapSize,

    /// Draw map dimensions up to the maximum instead of always using it.
    #[serde(default)]
    pub randomize_map_size: bool,

    /// Generation tier, 0 to 3.
    pub tier: Tier,

    /// Longest action script.
    pub max_action_length: u16,

    /// Per-execution timeout in seconds.
    pub timeout_secs: f64,

    /// Grace period between the polite and the forced kill, in milliseconds.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Exact number of player starts on tier 3 maps.
    #[serde(default = "default_player_count")]
    pub player_count: u16,

    /// Minimum number of food cells on tier 3 maps.
    #[serde(default = "default_min_food")]
    pub min_food: u16,

    /// Graceful rejection markers.
    #[serde(default)]
    pub rejection: RejectionRules,

    /// Output fragments that mark a crash.
    #[serde(default = "default_fault_signatures")]
    pub fault_signatures: Vec<String>,

    /// Interesting cases kept for the report; older ones are evicted first.
    #[serde(default = "default_retain_capacity")]
    pub retain_capacity: usize,

    /// Characters of captured output kept per retained case.
    #[serde(default = "default_output_excerpt_len")]
    pub output_excerpt_len: usize,

    /// Write a partial report this often, in seconds.
    #[serde(default)]
    pub partial_report_interval_secs: Option<u64>,

    /// Write retained cases' maps and scripts under `output_path/cases`.
    #[serde(default = "default_save_cases")]
    pub save_cases: bool,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./data/logs")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./data/output")
}

const fn default_kill_grace_ms() -> u64 {
    500
}

const fn default_player_count() -> u16 {
    1
}

const fn default_min_food() -> u16 {
    1
}

fn default_fault_signatures() -> Vec<String> {
    DEFAULT_FAULT_SIGNATURES.iter().map(ToString::to_string).collect()
}

const fn default_retain_capacity() -> usize {
    100
}

const fn default_output_excerpt_len() -> usize {
    500
}

const fn default_save_cases() -> bool {
    true
}

impl FuzzConfig {
    /// Create a configuration for `target_path` with default settings:
    /// 10x10 tier 2 maps, scripts of up to 10 actions, a 5 second timeout.
    #[must_use]
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: default_log_path(),
            output_path: default_output_path(),
            target_path: target_path.into(),
            target_args: Vec::new(),
            action_delivery: ActionDelivery::default(),
            seed: None,
            verbose: false,
            max_map_size: MapSize::new(10, 10),
            randomize_map_size: false,
            tier: Tier::Glyphs,
            max_action_length: 10,
            timeout_secs: 5.0,
            kill_grace_ms: default_kill_grace_ms(),
            player_count: default_player_count(),
            min_food: default_min_food(),
            rejection: RejectionRules::default(),
            fault_signatures: default_fault_signatures(),
            retain_capacity: default_retain_capacity(),
            output_excerpt_len: default_output_excerpt_len(),
            partial_report_interval_secs: None,
            save_cases: default_save_cases(),
        }
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON for
    /// this schema, or fails [`FuzzConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check option values that the schema alone cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns the first invalid option found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingTarget);
        }
        if self.max_action_length == 0 {
            return Err(ConfigError::ZeroActionLength);
        }
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }
        if self.tier == Tier::Playable {
            if self.player_count == 0 {
                return Err(ConfigError::ZeroPlayers);
            }
            let required = self.strategy().min_cells();
            if self.max_map_size.area() < required {
                return Err(ConfigError::MapTooSmall {
                    size: self.max_map_size,
                    required,
                });
            }
        }
        if self.fault_signatures.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyPattern {
                field: "fault_signatures",
            });
        }
        if self.rejection.patterns.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyPattern {
                field: "rejection.patterns",
            });
        }
        Ok(())
    }

    /// Builder: set the run seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder: set the generation tier.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Builder: set the maximum map size.
    #[must_use]
    pub fn with_max_map_size(mut self, width: u16, height: u16) -> Self {
        self.max_map_size = MapSize::new(width, height);
        self
    }

    /// Builder: set the longest action script.
    #[must_use]
    pub fn with_max_action_length(mut self, length: u16) -> Self {
        self.max_action_length = length;
        self
    }

    /// Builder: set the execution timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Builder: set the output directory.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Per-execution timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Grace period before a hard kill.
    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Interval between partial reports, if enabled.
    #[must_use]
    pub fn partial_report_interval(&self) -> Option<Duration> {
        self.partial_report_interval_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    /// Cell strategy for the configured tier.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        Strategy::for_tier(self.tier, self.player_count, self.min_food)
    }

    /// Map generator for the configured tier and size.
    #[must_use]
    pub fn map_generator(&self) -> MapGenerator {
        MapGenerator::new(self.strategy(), self.max_map_size)
            .with_random_size(self.randomize_map_size)
    }

    /// Action generator for the configured length. Tier 3 scripts end with
    /// an exit so well-formed runs terminate before the timeout.
    #[must_use]
    pub fn action_generator(&self) -> ActionGenerator {
        ActionGenerator::new(self.max_action_length).ending_with_exit(self.tier == Tier::Playable)
    }

    /// Path of the log file.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_path.join(LOG_FILE_NAME)
    }

    /// Path of the final (`partial == false`) or periodic report.
    #[must_use]
    pub fn report_path(&self, partial: bool) -> PathBuf {
        let name = if partial { "report_partial.md" } else { "report.md" };
        self.output_path.join(name)
    }

    /// Directory for saved interesting cases.
    #[must_use]
    pub fn cases_dir(&self) -> PathBuf {
        self.output_path.join("cases")
    }
}
