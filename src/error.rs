// src/error.rs

/// Fatal conditions raised by the reduction. Every variant aborts the current
/// decision point; the driver decides whether to continue with the next one.
#[derive(Debug, thiserror::Error)]
pub enum CbAdfError {
    #[error("cb_adf: badly formatted example at position {position}, only one cost can be known")]
    MultipleCosts { position: usize },

    #[error("cb_adf: example header at position {position}, can only be in initial position")]
    HeaderNotFirst { position: usize },

    #[error("cb_adf: badly formatted example, only one line can have a cost (found {count})")]
    MultipleLabeledLines { count: usize },

    #[error("Unknown cb_type specified for contextual bandit learning: {0}")]
    UnknownEstimator(String),

    #[error("cb_type dr requires a scorer")]
    MissingScorer,

    #[error("ring_size must be at least 3, got {0}")]
    InvalidRingSize(usize),

    #[error("Invalid value for {key}: {value}")]
    InvalidConfigValue { key: String, value: String },

    #[error("Negative loss {loss} for action at position {position}")]
    NegativeLoss { loss: f32, position: usize },

    #[error("Action handle {0} does not refer to a live action")]
    StaleHandle(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CbAdfError>;
