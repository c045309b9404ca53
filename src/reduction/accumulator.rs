// src/reduction/accumulator.rs
use log::{debug, error, info, warn};

use super::output::{PROGRESS_COLUMNS, PROGRESS_HEADER};
use super::types::{Operation, OutputSinks};
use crate::config::{EstimatorMode, ReductionConfig};
use crate::error::{CbAdfError, Result};
use crate::learner::{BaseLearner, Scorer};
use crate::models::{Action, ActionArena, ActionHandle, CbClass, CsLabel, Label};
use crate::results::SharedData;

/// State of the contextual bandit ADF reduction.
///
/// Actions arrive one at a time through `predict_or_learn` and are buffered
/// into the current decision point. A blank test line, or a buffer holding
/// `ring_size - 2` actions, flushes the decision point through validation,
/// label estimation and the base learner. The driver then calls
/// `finish_example`, which reports the flushed decision point and disposes of
/// its actions.
pub struct CbAdf<L: BaseLearner> {
    pub(crate) config: ReductionConfig,
    pub(crate) arena: ActionArena,
    pub(crate) ec_seq: Vec<ActionHandle>,
    pub(crate) need_to_clear: bool,
    pub(crate) known_cost: Option<CbClass>,
    // Bandit labels parked while the base learner sees cost-sensitive ones
    pub(crate) cb_labels: Vec<Label>,
    pub(crate) cs_labels: Vec<CsLabel>,
    pub(crate) base: L,
    pub(crate) scorer: Option<Box<dyn Scorer>>,
    pub(crate) sd: SharedData,
    pub(crate) sinks: OutputSinks,
}

impl<L: BaseLearner> CbAdf<L> {
    pub fn new(config: ReductionConfig, base: L) -> Result<Self> {
        Self::setup(config, base, None)
    }

    /// Setup with a scorer, required for doubly robust estimation.
    pub fn with_scorer(config: ReductionConfig, base: L, scorer: Box<dyn Scorer>) -> Result<Self> {
        Self::setup(config, base, Some(scorer))
    }

    fn setup(config: ReductionConfig, base: L, scorer: Option<Box<dyn Scorer>>) -> Result<Self> {
        config.validate()?;
        if config.cb_type == EstimatorMode::Dr && scorer.is_none() {
            return Err(CbAdfError::MissingScorer);
        }
        info!(
            "cb_adf setup: cb_type={}, ring_size={}",
            config.cb_type, config.ring_size
        );
        if !config.quiet {
            info!("{}", PROGRESS_HEADER);
            info!("{}", PROGRESS_COLUMNS);
        }

        Ok(Self {
            config,
            arena: ActionArena::new(),
            ec_seq: Vec::new(),
            need_to_clear: false,
            known_cost: None,
            cb_labels: Vec::new(),
            cs_labels: Vec::new(),
            base,
            scorer,
            sd: SharedData::new(),
            sinks: OutputSinks::new(),
        })
    }

    pub fn with_sinks(mut self, sinks: OutputSinks) -> Self {
        self.sinks = sinks;
        self
    }

    /// Take one action into the current decision point, flushing it when the
    /// action terminates a test decision point or the buffer is full.
    ///
    /// A flush that fails validation disposes of the whole decision point
    /// before the error is returned.
    pub fn predict_or_learn(&mut self, action: Action, operation: Operation) -> Result<ActionHandle> {
        let is_test_ec = action.is_test();
        let terminator = action.is_newline() && is_test_ec;
        let need_to_break = self.ec_seq.len() >= self.config.flush_threshold();
        let handle = self.arena.insert(action);

        if terminator || need_to_break {
            self.ec_seq.push(handle);
            if need_to_break && !terminator {
                warn!(
                    "Decision point reached {} actions, forcing a flush",
                    self.ec_seq.len()
                );
            }
            if let Err(e) = self.do_actual_learning(operation) {
                self.discard_seq();
                self.need_to_clear = false;
                return Err(e);
            }
            self.need_to_clear = true;
        } else {
            if self.need_to_clear {
                // Only when the driver skipped finish_example
                self.discard_seq();
                self.need_to_clear = false;
            }
            self.ec_seq.push(handle);
        }
        Ok(handle)
    }

    /// Dispose of every action of the current sequence without reporting.
    pub(crate) fn discard_seq(&mut self) {
        for handle in self.ec_seq.drain(..) {
            self.arena.release(handle);
        }
    }

    /// End of the input stream: a flushed decision point that was never
    /// finished is dropped without being processed again.
    pub fn end_examples(&mut self) {
        if self.need_to_clear {
            debug!("Dropping {} flushed actions at end of stream", self.ec_seq.len());
            self.discard_seq();
            self.need_to_clear = false;
        }
    }

    /// Tear the reduction down and hand back the accumulated statistics.
    pub fn finish(mut self) -> SharedData {
        if !self.ec_seq.is_empty() {
            warn!(
                "{} actions of an unterminated decision point were never flushed",
                self.ec_seq.len()
            );
        }
        self.discard_seq();
        let raw = self.sinks.raw_prediction.as_mut();
        for sink in self.sinks.final_prediction.iter_mut().chain(raw) {
            if let Err(e) = sink.flush() {
                error!("Failed to flush prediction sink: {}", e);
            }
        }
        self.sd
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    pub fn shared_data(&self) -> &SharedData {
        &self.sd
    }

    pub fn arena(&self) -> &ActionArena {
        &self.arena
    }

    pub fn batch(&self) -> &[ActionHandle] {
        &self.ec_seq
    }

    pub fn need_to_clear(&self) -> bool {
        self.need_to_clear
    }

    /// Observed cost of the last learned decision point.
    pub fn known_cost(&self) -> Option<&CbClass> {
        self.known_cost.as_ref()
    }

    /// Cost-sensitive labels of the last flush, one per action of the batch.
    pub fn cs_labels(&self) -> &[CsLabel] {
        &self.cs_labels[..self.ec_seq.len().min(self.cs_labels.len())]
    }

    pub fn base(&self) -> &L {
        &self.base
    }
}
