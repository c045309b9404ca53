// src/reduction/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Whether a flush trains the base learner or only asks it for predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Predict,
    Learn,
}

impl Operation {
    pub fn is_learn(&self) -> bool {
        matches!(self, Operation::Learn)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Predict => f.write_str("predict"),
            Operation::Learn => f.write_str("learn"),
        }
    }
}

/// Where predictions go. Every final sink receives one value per action and a
/// blank line per decision point; the raw sink receives `action:score` pairs.
#[derive(Default)]
pub struct OutputSinks {
    pub final_prediction: Vec<Box<dyn Write>>,
    pub raw_prediction: Option<Box<dyn Write>>,
}

impl OutputSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_final_prediction(mut self, sink: Box<dyn Write>) -> Self {
        self.final_prediction.push(sink);
        self
    }

    pub fn with_raw_prediction(mut self, sink: Box<dyn Write>) -> Self {
        self.raw_prediction = Some(sink);
        self
    }
}

impl fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSinks")
            .field("final_prediction", &self.final_prediction.len())
            .field("raw_prediction", &self.raw_prediction.is_some())
            .finish()
    }
}
