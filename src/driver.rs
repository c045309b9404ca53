// src/driver.rs
use anyhow::{Context, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Instant;

use crate::learner::BaseLearner;
use crate::models::{Action, CbClass, CbLabel, Feature};
use crate::reduction::{CbAdf, Operation};
use crate::results::RunStats;

pub const ENV_INPUT: &str = "CB_ADF_INPUT";
pub const ENV_RAW_OUTPUT: &str = "CB_ADF_RAW_OUTPUT";
pub const ENV_TEST_ONLY: &str = "CB_ADF_TEST_ONLY";

/// Settings of the binary that are not part of the reduction itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    /// JSON Lines input, stdin when unset
    pub input: Option<String>,
    /// File receiving raw `action:score` output
    pub raw_output: Option<String>,
    /// Predict only, never learn
    pub test_only: bool,
}

impl DriverConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            input: non_empty(ENV_INPUT),
            raw_output: non_empty(ENV_RAW_OUTPUT),
            test_only: non_empty(ENV_TEST_ONLY)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    pub fn operation(&self) -> Operation {
        if self.test_only {
            Operation::Predict
        } else {
            Operation::Learn
        }
    }
}

/// One input line. A blank line is the terminator of a decision point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub costs: Vec<CbClass>,
    /// Shared-context header of the decision point
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub tag: String,
}

impl From<ActionRecord> for Action {
    fn from(record: ActionRecord) -> Self {
        let label = if record.shared {
            CbLabel::shared()
        } else {
            CbLabel::new(record.costs)
        };
        Action::new(record.features, label).with_tag(record.tag)
    }
}

pub fn parse_line(line: &str) -> Result<Action> {
    if line.trim().is_empty() {
        return Ok(Action::newline());
    }
    let record: ActionRecord =
        serde_json::from_str(line).with_context(|| format!("Malformed action line: {}", line))?;
    Ok(record.into())
}

/// Take one action through intake and finish. A rejected decision point is
/// logged and counted; the run carries on with the next one.
fn process_action<L: BaseLearner>(
    reduction: &mut CbAdf<L>,
    action: Action,
    operation: Operation,
    stats: &mut RunStats,
) {
    stats.total_lines += 1;
    let handle = match reduction.predict_or_learn(action, operation) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Decision point rejected at line {}: {}", stats.total_lines, e);
            stats.rejected_decisions += 1;
            return;
        }
    };
    if let Err(e) = reduction.finish_example(handle) {
        error!("Failed to report decision point at line {}: {}", stats.total_lines, e);
        stats.rejected_decisions += 1;
    }
}

/// Feed actions one at a time through the reduction, then close the stream.
pub fn drive<L, I>(reduction: &mut CbAdf<L>, actions: I, operation: Operation, stats: &mut RunStats)
where
    L: BaseLearner,
    I: IntoIterator<Item = Action>,
{
    for action in actions {
        process_action(reduction, action, operation, stats);
    }
    reduction.end_examples();
}

/// Stream JSON Lines from `reader` through the reduction.
pub fn run<L: BaseLearner, R: BufRead>(
    reduction: &mut CbAdf<L>,
    reader: R,
    operation: Operation,
    description: Option<String>,
) -> Result<RunStats> {
    let start_time = Instant::now();
    let mut stats = RunStats::new(reduction.config().cb_type, description);
    info!("Starting run {} ({})", stats.run_id, operation);

    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read input line {}", i + 1))?;
        let action = parse_line(&line).with_context(|| format!("Input line {}", i + 1))?;
        process_action(reduction, action, operation, &mut stats);
    }
    reduction.end_examples();
    debug!("Consumed {} input lines", stats.total_lines);

    stats.record_totals(reduction.shared_data(), start_time.elapsed());
    Ok(stats)
}
