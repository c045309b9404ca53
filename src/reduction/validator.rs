// src/reduction/validator.rs
use log::error;

use crate::error::{CbAdfError, Result};
use crate::models::{is_sentinel, Action, ActionArena, ActionHandle};

/// Check the structure of an accumulated decision point.
///
/// Returns `true` for a test sequence (no line carries a cost) and `false` for
/// a training sequence (exactly one line does). Multiple costs on a line, a
/// shared header after position 0, or more than one costed line are errors.
pub fn test_adf_sequence(arena: &ActionArena, seq: &[ActionHandle]) -> Result<bool> {
    let mut count = 0usize;

    for (k, handle) in seq.iter().enumerate() {
        let Some(ld) = arena.get(*handle).and_then(Action::cb_label) else {
            continue;
        };

        if ld.costs.len() > 1 {
            error!("cb_adf: badly formatted example, only one cost can be known.");
            return Err(CbAdfError::MultipleCosts { position: k });
        }

        if ld.costs.len() == 1 && !is_sentinel(ld.costs[0].cost) {
            count += 1;
        }

        if k > 0 && ld.is_header() {
            error!(
                "example header at position {}: can only have in initial position!",
                k
            );
            return Err(CbAdfError::HeaderNotFirst { position: k });
        }
    }

    match count {
        0 => Ok(true),
        1 => Ok(false),
        _ => {
            error!("cb_adf: badly formatted example, only one line can have a cost");
            Err(CbAdfError::MultipleLabeledLines { count })
        }
    }
}
