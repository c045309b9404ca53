// src/reduction/output.rs
use log::{error, info};
use std::io::Write;

use super::accumulator::CbAdf;
use crate::error::{CbAdfError, Result};
use crate::learner::BaseLearner;
use crate::models::ActionHandle;

/// Write one record, logging failures instead of aborting the batch.
fn write_record(sink: &mut dyn Write, record: &str) {
    if let Err(e) = sink.write_all(record.as_bytes()) {
        error!("write error: {}", e);
    }
}

fn with_tag(mut text: String, tag: &str) -> String {
    if !tag.is_empty() {
        text.push(' ');
        text.push_str(tag);
    }
    text.push('\n');
    text
}

/// `value[ tag]\n`
pub fn format_prediction(value: f32, tag: &str) -> String {
    with_tag(value.to_string(), tag)
}

/// `text[ tag]\n`
pub fn format_text(text: &str, tag: &str) -> String {
    with_tag(text.to_string(), tag)
}

pub const PROGRESS_HEADER: &str =
    "average    since         example     example  current  current  current";
pub const PROGRESS_COLUMNS: &str =
    "loss       last          counter      weight    label  predict features";

impl<L: BaseLearner> CbAdf<L> {
    fn output_example(&mut self, handle: ActionHandle, hit_loss: &mut bool, position: usize) -> Result<()> {
        let Some(action) = self.arena.get(handle) else {
            return Ok(());
        };
        if action.is_newline() || action.is_header() {
            return Ok(());
        }

        let is_test = action.is_test();
        let num_features = action.num_features();
        let predicted = action.prediction.multiclass;
        let tag = action.tag.clone();
        let costs = action.cb_label().map(|ld| ld.costs.clone()).unwrap_or_default();

        self.sd.total_features += num_features as u64;

        if !is_test {
            let mut loss = 0.0f32;
            for cost in &costs {
                if *hit_loss {
                    break;
                }
                if predicted == cost.action {
                    loss = cost.cost;
                    *hit_loss = true;
                }
            }
            if loss < 0.0 {
                error!("Negative loss {} at position {}", loss, position);
                return Err(CbAdfError::NegativeLoss { loss, position });
            }
            self.sd.add_loss(loss);
        }

        let record = format_prediction(predicted as f32, &tag);
        for sink in self.sinks.final_prediction.iter_mut() {
            write_record(sink.as_mut(), &record);
        }

        if self.config.raw_predictions {
            let score = self
                .cs_labels
                .get(position)
                .and_then(|ld| ld.costs.first())
                .map_or(0.0, |wc| wc.partial_prediction);
            if let Some(sink) = self.sinks.raw_prediction.as_mut() {
                let scores = costs
                    .iter()
                    .map(|c| format!("{}:{}", c.action, score))
                    .collect::<Vec<_>>()
                    .join(" ");
                write_record(sink.as_mut(), &format_text(&scores, &tag));
            }
        }

        self.print_update(is_test, predicted, num_features);
        Ok(())
    }

    /// Report one line of the progress table once the example count reaches
    /// the next dump interval.
    fn print_update(&mut self, is_test: bool, predicted: u32, num_features: usize) {
        if self.sd.weighted_examples < self.sd.dump_interval || self.config.quiet {
            return;
        }
        info!(
            "{:<10.6} {:<10.6} {:>12} {:>11.1} {:>8} {:>8} {:>8}",
            self.sd.average_loss(),
            self.sd.average_loss_since_last_dump(),
            self.sd.example_number,
            self.sd.weighted_examples,
            if is_test { "unknown" } else { "known" },
            predicted,
            num_features
        );
        self.sd.update_dump_interval();
    }

    fn output_example_seq(&mut self) -> Result<()> {
        if self.ec_seq.is_empty() {
            return Ok(());
        }
        self.sd.weighted_examples += 1.0;
        self.sd.example_number += 1;

        let mut hit_loss = false;
        let seq = std::mem::take(&mut self.ec_seq);
        let reported = seq
            .iter()
            .enumerate()
            .try_for_each(|(position, handle)| self.output_example(*handle, &mut hit_loss, position));
        let first_tag = self
            .arena
            .get(seq[0])
            .map(|a| a.tag.clone())
            .unwrap_or_default();
        self.ec_seq = seq;
        reported?;

        if self.config.raw_predictions {
            if let Some(sink) = self.sinks.raw_prediction.as_mut() {
                write_record(sink.as_mut(), &format_text("", &first_tag));
            }
        }
        Ok(())
    }

    /// A blank line to every final prediction sink, separating decision points.
    fn global_print_newline(&mut self) {
        for sink in self.sinks.final_prediction.iter_mut() {
            match sink.write(b"\n") {
                Ok(1) => {}
                Ok(n) => error!("write error: short write of {} bytes", n),
                Err(e) => error!("write error: {}", e),
            }
        }
    }

    fn clear_seq_and_finish_examples(&mut self) {
        for handle in self.ec_seq.drain(..) {
            if self.arena.get(handle).map_or(false, |a| a.in_use) {
                self.arena.release(handle);
            }
        }
    }

    /// Driver callback after every intake. Once a decision point has been
    /// flushed it is reported, its actions are disposed of, and `handle` is
    /// released if it is still live. Otherwise this does nothing.
    pub fn finish_example(&mut self, handle: ActionHandle) -> Result<()> {
        if !self.need_to_clear {
            return Ok(());
        }

        let reported = self.output_example_seq();
        if reported.is_ok() && !self.ec_seq.is_empty() {
            self.global_print_newline();
        }
        self.clear_seq_and_finish_examples();
        self.need_to_clear = false;
        if self.arena.contains(handle) {
            self.arena.release(handle);
        }
        reported
    }
}
