// src/config.rs

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CbAdfError, Result};

// Default number of buffered examples; a decision point is force-flushed once
// it holds RING_SIZE - 2 actions.
pub const DEFAULT_RING_SIZE: usize = 256;
pub const MIN_RING_SIZE: usize = 3;

// Environment variable names
pub const ENV_CB_TYPE: &str = "CB_ADF_TYPE";
pub const ENV_RING_SIZE: &str = "CB_ADF_RING_SIZE";
pub const ENV_RAW_PREDICTIONS: &str = "CB_ADF_RAW_PREDICTIONS";
pub const ENV_QUIET: &str = "CB_ADF_QUIET";

// Files tried in order by the binary before reading the environment
pub const ENV_FILE_PATHS: [&str; 3] = [".env", ".env.local", "../.env"];

/// Off-policy estimator used to turn bandit feedback into cost-sensitive labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorMode {
    /// Doubly robust: scorer baseline plus importance-weighted residual
    Dr,
    /// Inverse propensity score
    #[default]
    Ips,
}

impl EstimatorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorMode::Dr => "dr",
            EstimatorMode::Ips => "ips",
        }
    }
}

impl fmt::Display for EstimatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimatorMode {
    type Err = CbAdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dr" => Ok(EstimatorMode::Dr),
            "ips" => Ok(EstimatorMode::Ips),
            _ => Err(CbAdfError::UnknownEstimator(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    pub cb_type: EstimatorMode,
    pub ring_size: usize,
    /// Emit `action:score` pairs to the raw prediction sink
    pub raw_predictions: bool,
    /// Suppress the progress table
    pub quiet: bool,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            cb_type: EstimatorMode::Ips,
            ring_size: DEFAULT_RING_SIZE,
            raw_predictions: false,
            quiet: false,
        }
    }
}

impl ReductionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ring_size < MIN_RING_SIZE {
            return Err(CbAdfError::InvalidRingSize(self.ring_size));
        }
        Ok(())
    }

    /// Largest number of buffered actions before an intake forces a flush.
    pub fn flush_threshold(&self) -> usize {
        self.ring_size.saturating_sub(2)
    }

    /// Build a config from `CB_ADF_*` variables. Missing variables keep their
    /// defaults; present but malformed ones are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_CB_TYPE) {
            config.cb_type = value.parse()?;
        }
        if let Ok(value) = std::env::var(ENV_RING_SIZE) {
            config.ring_size = value
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(ENV_RING_SIZE, &value))?;
        }
        if let Ok(value) = std::env::var(ENV_RAW_PREDICTIONS) {
            config.raw_predictions = parse_flag(ENV_RAW_PREDICTIONS, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_QUIET) {
            config.quiet = parse_flag(ENV_QUIET, &value)?;
        }

        config.validate()?;
        info!(
            "Reduction config: cb_type={}, ring_size={}, raw_predictions={}, quiet={}",
            config.cb_type, config.ring_size, config.raw_predictions, config.quiet
        );
        Ok(config)
    }
}

fn invalid(key: &str, value: &str) -> CbAdfError {
    CbAdfError::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Apply `KEY=value` lines from an env file. Variables that are already set
/// win over the file; comments and lines without `=` are ignored.
pub fn load_env_from_file(file_path: &str) -> anyhow::Result<usize> {
    use anyhow::Context;

    let contents = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read env file {}", file_path))?;
    let mut applied = 0;
    for (key, value) in contents.lines().filter_map(parse_env_line) {
        if std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
            applied += 1;
        }
    }
    debug!("{}: applied {} variables", file_path, applied);
    Ok(applied)
}

fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    (!key.is_empty()).then(|| (key, value.trim().trim_matches('"')))
}

/// Load the first env file of `ENV_FILE_PATHS` that exists. Returns its path.
pub fn load_first_env_file() -> Option<&'static str> {
    for path in ENV_FILE_PATHS {
        if !std::path::Path::new(path).exists() {
            continue;
        }
        match load_env_from_file(path) {
            Ok(_) => return Some(path),
            Err(e) => warn!("Skipping {}: {:#}", path, e),
        }
    }
    None
}
