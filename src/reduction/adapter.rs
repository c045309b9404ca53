// src/reduction/adapter.rs
use log::{debug, warn};

use super::accumulator::CbAdf;
use super::estimator::{gen_cs_example_dr, gen_cs_example_ips};
use super::types::Operation;
use super::validator::test_adf_sequence;
use crate::config::EstimatorMode;
use crate::error::{CbAdfError, Result};
use crate::learner::BaseLearner;
use crate::models::{Action, ActionArena, ActionHandle, CbClass, CsLabel, Label};

/// Run the base learner over a sequence with cost-sensitive labels in place.
///
/// Each action's bandit label is parked in `cb_labels` and replaced by its
/// slot of `cs_labels`; after the learner has seen every action the bandit
/// labels are put back and the cost-sensitive labels return to `cs_labels`, so
/// both buffers keep their allocations. The closing action's prediction is the
/// choice for the decision point and is given to every action of `seq`; only
/// `prediction` on the actions can change.
pub fn call_predict_or_learn<L: BaseLearner + ?Sized>(
    base: &mut L,
    arena: &mut ActionArena,
    seq: &[ActionHandle],
    cs_labels: &mut [CsLabel],
    cb_labels: &mut Vec<Label>,
    operation: Operation,
) -> Result<()> {
    if let Some(stale) = seq.iter().find(|h| !arena.contains(**h)) {
        return Err(CbAdfError::StaleHandle(stale.0));
    }
    if cs_labels.len() < seq.len() {
        warn!(
            "Only {} cost-sensitive labels for {} actions",
            cs_labels.len(),
            seq.len()
        );
    }
    let seq = &seq[..seq.len().min(cs_labels.len())];
    let has_header = seq
        .first()
        .and_then(|h| arena.get(*h))
        .map_or(false, Action::is_header);

    cb_labels.clear();
    for (i, handle) in seq.iter().enumerate() {
        if let Some(action) = arena.get_mut(*handle) {
            let cs = std::mem::take(&mut cs_labels[i]);
            cb_labels.push(std::mem::replace(&mut action.label, Label::CostSensitive(cs)));
        }
    }

    base.start_sequence(has_header);
    for handle in seq {
        if let Some(action) = arena.get_mut(*handle) {
            match operation {
                Operation::Learn => base.learn(action),
                Operation::Predict => base.predict(action),
            }
        }
    }

    if let Some(chosen) = seq.last().and_then(|h| arena.get(*h)).map(|a| a.prediction) {
        for handle in seq {
            if let Some(action) = arena.get_mut(*handle) {
                action.prediction = chosen;
            }
        }
    }

    for (i, (handle, saved)) in seq.iter().zip(cb_labels.drain(..)).enumerate() {
        if let Some(action) = arena.get_mut(*handle) {
            if let Label::CostSensitive(cs) = std::mem::replace(&mut action.label, saved) {
                cs_labels[i] = cs;
            }
        }
    }
    Ok(())
}

/// The observed cost of a training sequence: the last line with a single
/// observed cost entry.
pub fn find_known_cost(arena: &ActionArena, seq: &[ActionHandle]) -> Option<CbClass> {
    seq.iter()
        .rev()
        .filter_map(|h| arena.get(*h).and_then(Action::cb_label))
        .find(|ld| ld.costs.len() == 1 && ld.costs[0].is_observed())
        .and_then(|ld| ld.observed_cost().copied())
}

impl<L: BaseLearner> CbAdf<L> {
    fn run_base(&mut self, operation: Operation) -> Result<()> {
        call_predict_or_learn(
            &mut self.base,
            &mut self.arena,
            &self.ec_seq,
            &mut self.cs_labels,
            &mut self.cb_labels,
            operation,
        )
    }

    fn learn(&mut self) -> Result<()> {
        self.known_cost = find_known_cost(&self.arena, &self.ec_seq);
        if self.known_cost.is_none() {
            warn!("known cost is null.");
        }

        match self.config.cb_type {
            EstimatorMode::Ips => {
                gen_cs_example_ips(&self.arena, &self.ec_seq, &mut self.cs_labels)
            }
            EstimatorMode::Dr => {
                let scorer = self.scorer.as_deref_mut().ok_or(CbAdfError::MissingScorer)?;
                gen_cs_example_dr(
                    scorer,
                    self.known_cost.as_ref(),
                    &self.arena,
                    &self.ec_seq,
                    &mut self.cs_labels,
                    Operation::Learn,
                );
            }
        }

        self.run_base(Operation::Learn)
    }

    /// Validate the flushed sequence and hand it to the base learner. Test
    /// sequences and predict calls get IPS labels and are only predicted.
    pub(crate) fn do_actual_learning(&mut self, operation: Operation) -> Result<()> {
        self.known_cost = None;
        let is_test = test_adf_sequence(&self.arena, &self.ec_seq)?;
        debug!(
            "Flushing {} actions ({}, {})",
            self.ec_seq.len(),
            if is_test { "test" } else { "train" },
            operation
        );

        if is_test || !operation.is_learn() {
            gen_cs_example_ips(&self.arena, &self.ec_seq, &mut self.cs_labels);
            self.run_base(Operation::Predict)
        } else {
            self.learn()
        }
    }
}
