use thiserror::Error;

/// Errors raised by the prediction and bundle engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input, e.g. a non-decimal price or inconsistent record.
    #[error("invalid game data: {0}")]
    Validation(String),

    /// Not enough qualified predictions to build a bundle.
    #[error("insufficient data: {qualified} qualified prediction(s), at least {required} required")]
    InsufficientData { qualified: usize, required: usize },

    /// No subset satisfied the odds tolerance and correlation cap.
    #[error(
        "no combination of {candidates} candidate(s) within tolerance {tolerance:.2} of target odds {target_odds:.2}"
    )]
    NoCombinationFound {
        target_odds: f64,
        tolerance: f64,
        candidates: usize,
    },

    /// The upstream game source failed.
    #[error("game source failed: {0}")]
    Source(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
