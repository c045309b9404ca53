// src/learner.rs

use log::debug;
use serde::{Deserialize, Serialize};

use crate::models::{Action, CbClass, Feature};

/// Downstream multiclass learner. It reads the cost-sensitive label the
/// adapter placed on the action and writes `action.prediction`.
pub trait BaseLearner {
    /// Called once before the actions of a decision point are handed over.
    /// `has_header` is set when the first of them is a shared header.
    fn start_sequence(&mut self, _has_header: bool) {}

    fn predict(&mut self, action: &mut Action);
    fn learn(&mut self, action: &mut Action);
}

/// Regression capability used by the doubly robust estimator for its baseline.
pub trait Scorer {
    /// Predicted cost of `class_index` for this action.
    fn predict_cost(&mut self, action: &Action, class_index: u32) -> f32;

    /// Train on an observed cost and return the prediction made before the
    /// update.
    fn learn_cost(&mut self, action: &Action, class_index: u32, observed: &CbClass) -> f32;
}

pub const DEFAULT_WEIGHT_BITS: u32 = 18;
pub const DEFAULT_LEARNING_RATE: f32 = 0.1;

/// Online squared-loss regressor over hashed sparse features.
///
/// As a base learner it treats every action line as one candidate: the
/// cost-sensitive `x` is the regression target, a header announced through
/// `start_sequence` supplies shared features for the rest of the decision
/// point, and the line carrying the sentinel closes it. Candidates are numbered
/// from 1 in arrival order. Each score is written to the label's
/// `partial_prediction`, and each line's prediction is the lowest scoring
/// candidate seen so far, so the closing line carries the final choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineRegressor {
    weights: Vec<f32>,
    mask: u64,
    learning_rate: f32,
    #[serde(skip)]
    sequence: SequenceState,
}

#[derive(Debug, Clone, Default)]
struct SequenceState {
    shared: Vec<Feature>,
    header_pending: bool,
    position: u32,
    best: Option<(u32, f32)>,
}

impl Default for OnlineRegressor {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT_BITS, DEFAULT_LEARNING_RATE)
    }
}

impl OnlineRegressor {
    pub fn new(bits: u32, learning_rate: f32) -> Self {
        let size = 1usize << bits;
        Self {
            weights: vec![0.0; size],
            mask: (size as u64) - 1,
            learning_rate,
            sequence: SequenceState::default(),
        }
    }

    fn dot(&self, features: &[Feature]) -> f32 {
        features
            .iter()
            .map(|f| self.weights[(f.index & self.mask) as usize] * f.value)
            .sum()
    }

    /// Score of an action including any shared features of its decision point.
    pub fn score(&self, action: &Action) -> f32 {
        self.dot(&action.features) + self.dot(&self.sequence.shared)
    }

    fn update(&mut self, features: &[Feature], gradient: f32) {
        for f in features {
            let idx = (f.index & self.mask) as usize;
            self.weights[idx] -= self.learning_rate * gradient * f.value;
        }
    }

    fn train(&mut self, action: &Action, target: f32) -> f32 {
        let prediction = self.score(action);
        let gradient = prediction - target;
        self.update(&action.features, gradient);
        let shared = std::mem::take(&mut self.sequence.shared);
        self.update(&shared, gradient);
        self.sequence.shared = shared;
        prediction
    }

    fn step(&mut self, action: &mut Action, learn: bool) {
        let Some((target, end_of_sequence)) = action
            .cs_label()
            .and_then(|ld| ld.costs.first().map(|wc| (wc.x, ld.ends_sequence())))
        else {
            debug!("OnlineRegressor: action without cost-sensitive label, skipping");
            return;
        };

        if std::mem::take(&mut self.sequence.header_pending) {
            self.sequence.shared = action.features.clone();
            action.prediction.multiclass = 0;
            return;
        }

        if !action.is_newline() {
            self.sequence.position += 1;
            let score = if learn && !end_of_sequence {
                self.train(action, target)
            } else {
                self.score(action)
            };
            if let Some(wc) = action.cs_label_mut().and_then(|ld| ld.costs.first_mut()) {
                wc.partial_prediction = score;
            }
            let candidate = self.sequence.position;
            match self.sequence.best {
                Some((_, best)) if best <= score => {}
                _ => self.sequence.best = Some((candidate, score)),
            }
        }

        action.prediction.multiclass = self.sequence.best.map_or(0, |(id, _)| id);

        if end_of_sequence {
            self.sequence = SequenceState::default();
        }
    }
}

impl BaseLearner for OnlineRegressor {
    fn start_sequence(&mut self, has_header: bool) {
        self.sequence = SequenceState {
            header_pending: has_header,
            ..SequenceState::default()
        };
    }

    fn predict(&mut self, action: &mut Action) {
        self.step(action, false);
    }

    fn learn(&mut self, action: &mut Action) {
        self.step(action, true);
    }
}

impl Scorer for OnlineRegressor {
    fn predict_cost(&mut self, action: &Action, _class_index: u32) -> f32 {
        self.dot(&action.features)
    }

    fn learn_cost(&mut self, action: &Action, _class_index: u32, observed: &CbClass) -> f32 {
        let prediction = self.dot(&action.features);
        self.update(&action.features, prediction - observed.cost);
        prediction
    }
}
