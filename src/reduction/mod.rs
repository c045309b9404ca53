// src/reduction/mod.rs

// Module declarations
mod accumulator;
mod adapter;
pub mod estimator; // Public so drivers can inspect labels without a full flush
mod output;
mod types;
pub mod validator;

pub use accumulator::CbAdf;
pub use adapter::{call_predict_or_learn, find_known_cost};
pub use estimator::{gen_cs_example_dr, gen_cs_example_ips, gen_cs_label_dr, ips_estimate};
pub use output::{format_prediction, format_text};
pub use types::{Operation, OutputSinks};
pub use validator::test_adf_sequence;
