//!
//! Errors of the training computations
//!
use thiserror::Error;

pub type CctcResult<T> = Result<T, CctcError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CctcError {
    /// Shapes of the input matrices (or of the supervision) disagree.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The supervision automaton cannot be used for the computation.
    #[error("invalid supervision automaton: {0}")]
    InvalidAutomaton(String),

    /// Forward/Backward were called out of order.
    #[error("invalid computation state: {0}")]
    InvalidState(String),

    /// NaN or Inf was detected in the objective or in the derivatives.
    #[error("numeric instability: {0}")]
    NumericInstability(String),
}

impl CctcError {
    /// Build `DimensionMismatch` describing two disagreeing shapes.
    pub fn shape(what: &str, expected: (usize, usize), actual: (usize, usize)) -> Self {
        CctcError::DimensionMismatch(format!(
            "{} should be {}x{} but is {}x{}",
            what, expected.0, expected.1, actual.0, actual.1
        ))
    }
    /// The example should be skipped, but training can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CctcError::NumericInstability(_))
    }
}
