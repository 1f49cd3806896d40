use thiserror::Error;

/// Errors raised by the analysis engines.
///
/// Too little price history is never an error: analyzers answer with empty
/// results instead, so callers can tell "nothing to see yet" apart from a
/// misconfigured engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}
