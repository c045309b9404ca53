// src/results.rs

use chrono::{NaiveDateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::EstimatorMode;

/// Running statistics shared between the reduction and the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedData {
    pub total_features: u64,
    pub sum_loss: f64,
    pub sum_loss_since_last_dump: f64,
    /// Decision points reported
    pub weighted_examples: f64,
    /// `weighted_examples` when the last progress line was printed
    pub old_weighted_examples: f64,
    pub example_number: u64,
    /// `weighted_examples` at which the next progress line is printed
    pub dump_interval: f64,
}

impl SharedData {
    pub fn new() -> Self {
        Self {
            dump_interval: 1.0,
            ..Self::default()
        }
    }

    pub fn average_loss(&self) -> f64 {
        if self.weighted_examples > 0.0 {
            self.sum_loss / self.weighted_examples
        } else {
            0.0
        }
    }

    pub fn average_loss_since_last_dump(&self) -> f64 {
        let weight = self.weighted_examples - self.old_weighted_examples;
        if weight > 0.0 {
            self.sum_loss_since_last_dump / weight
        } else {
            0.0
        }
    }

    /// Progress lines are printed at exponentially growing intervals.
    pub fn update_dump_interval(&mut self) {
        self.sum_loss_since_last_dump = 0.0;
        self.old_weighted_examples = self.weighted_examples;
        self.dump_interval *= 2.0;
    }

    pub fn add_loss(&mut self, loss: f32) {
        self.sum_loss += loss as f64;
        self.sum_loss_since_last_dump += loss as f64;
    }
}

/// Summary of one run of the driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub description: Option<String>,

    pub cb_type: EstimatorMode,
    /// Input lines consumed, blank terminators included
    pub total_lines: usize,
    /// Decision points reported
    pub total_decisions: u64,
    /// Decision points rejected by validation
    pub rejected_decisions: usize,
    pub total_features: u64,
    pub average_loss: f64,
    pub processing_time: f64,
}

impl RunStats {
    pub fn new(cb_type: EstimatorMode, description: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            run_timestamp: Utc::now().naive_utc(),
            description,
            cb_type,
            total_lines: 0,
            total_decisions: 0,
            rejected_decisions: 0,
            total_features: 0,
            average_loss: 0.0,
            processing_time: 0.0,
        }
    }

    pub fn record_totals(&mut self, sd: &SharedData, elapsed: Duration) {
        self.total_decisions = sd.example_number;
        self.total_features = sd.total_features;
        self.average_loss = sd.average_loss();
        self.processing_time = elapsed.as_secs_f64();
    }

    pub fn log_report(&self) {
        info!(
            "Run {} ({}) finished in {:.2}s: {} lines, {} decision points ({} rejected), {} features, average loss {:.6}",
            self.run_id,
            self.cb_type,
            self.processing_time,
            self.total_lines,
            self.total_decisions,
            self.rejected_decisions,
            self.total_features,
            self.average_loss
        );
        if let Ok(json) = serde_json::to_string(self) {
            info!("Run report: {}", json);
        }
    }
}
