// src/lib.rs
pub mod config;
pub mod driver;
pub mod error;
pub mod learner;
pub mod models;
pub mod reduction;
pub mod results;

// Re-export common types for easier access
pub use config::{EstimatorMode, ReductionConfig};
pub use error::CbAdfError;
pub use learner::{BaseLearner, OnlineRegressor, Scorer};
pub use models::{
    Action, ActionArena, ActionHandle, CbClass, CbLabel, CsClass, CsLabel, Feature, Label,
    Prediction, COST_SENTINEL,
};
pub use reduction::{CbAdf, Operation, OutputSinks};
pub use results::{RunStats, SharedData};
