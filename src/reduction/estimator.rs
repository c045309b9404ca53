// src/reduction/estimator.rs
//
// Turns the bandit labels of one decision point into cost-sensitive labels,
// one per action, written into a buffer that is reused across flushes.

use log::debug;

use super::types::Operation;
use crate::learner::Scorer;
use crate::models::{
    is_sentinel, Action, ActionArena, ActionHandle, CbClass, CbLabel, CsClass, CsLabel,
    COST_SENTINEL, HEADER_ESTIMATE,
};

// Candidate class handed to the scorer; with action-dependent features every
// line is a single candidate.
const SCORER_CLASS: u32 = 1;

/// Make sure `cs_labels` has a slot for every action of the sequence.
fn reserve_labels(cs_labels: &mut Vec<CsLabel>, len: usize) {
    if cs_labels.len() < len {
        cs_labels.resize_with(len, CsLabel::default);
    }
}

fn set_single(label: &mut CsLabel, wc: CsClass) {
    label.costs.clear();
    label.costs.push(wc);
}

/// Mark the end of the decision point on the last slot and turn a leading
/// shared header into its `-1` placeholder.
fn mark_sequence(arena: &ActionArena, seq: &[ActionHandle], cs_labels: &mut [CsLabel]) {
    let Some(last) = seq.len().checked_sub(1) else {
        return;
    };
    if let Some(wc) = cs_labels[last].costs.first_mut() {
        wc.x = COST_SENTINEL;
    }

    if arena.get(seq[0]).map_or(false, Action::is_header) {
        if let Some(wc) = cs_labels[0].costs.first_mut() {
            wc.class_index = 0;
            wc.x = HEADER_ESTIMATE;
        }
    }
}

/// Importance-weighted cost of one line: `cost / probability` for a single
/// observed cost, zero otherwise.
pub fn ips_estimate(ld: &CbLabel) -> f32 {
    match ld.costs.as_slice() {
        [only] if !is_sentinel(only.cost) => only.cost / only.probability,
        _ => 0.0,
    }
}

/// Inverse propensity score labels for the whole sequence.
pub fn gen_cs_example_ips(arena: &ActionArena, seq: &[ActionHandle], cs_labels: &mut Vec<CsLabel>) {
    if seq.is_empty() {
        return;
    }
    reserve_labels(cs_labels, seq.len());

    for (i, handle) in seq.iter().enumerate() {
        let x = arena
            .get(*handle)
            .and_then(Action::cb_label)
            .map_or(0.0, ips_estimate);
        set_single(&mut cs_labels[i], CsClass::new(0, x));
    }

    mark_sequence(arena, seq, &mut cs_labels[..seq.len()]);
}

/// Doubly robust label for one action: the scorer's baseline, corrected by the
/// importance-weighted residual when this action carries the observed cost.
pub fn gen_cs_label_dr(
    scorer: &mut dyn Scorer,
    known_cost: Option<&CbClass>,
    action: &Action,
    operation: Operation,
) -> CsClass {
    let class_id = action.cb_label().and_then(|ld| match ld.costs.as_slice() {
        [only] => Some(only.action),
        _ => None,
    });
    let observed = known_cost.filter(|kc| Some(kc.action) == class_id);

    let baseline = match observed {
        Some(kc) if operation.is_learn() => scorer.learn_cost(action, SCORER_CLASS, kc),
        _ => scorer.predict_cost(action, SCORER_CLASS),
    };

    let x = match observed {
        Some(kc) => baseline + (kc.cost - baseline) / kc.probability,
        None => baseline,
    };
    CsClass::new(0, x)
}

/// Doubly robust labels for the whole sequence. Shared headers and the end of
/// the sequence are marked exactly as for IPS.
pub fn gen_cs_example_dr(
    scorer: &mut dyn Scorer,
    known_cost: Option<&CbClass>,
    arena: &ActionArena,
    seq: &[ActionHandle],
    cs_labels: &mut Vec<CsLabel>,
    operation: Operation,
) {
    if seq.is_empty() {
        return;
    }
    reserve_labels(cs_labels, seq.len());

    for (i, handle) in seq.iter().enumerate() {
        let wc = match arena.get(*handle) {
            Some(action) if !action.is_header() => {
                gen_cs_label_dr(scorer, known_cost, action, operation)
            }
            _ => CsClass::new(0, 0.0),
        };
        set_single(&mut cs_labels[i], wc);
    }
    debug!("Generated {} doubly robust labels", seq.len());

    mark_sequence(arena, seq, &mut cs_labels[..seq.len()]);
}
