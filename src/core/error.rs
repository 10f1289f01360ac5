//! Failures of a single forward or backward call. None of them are retried
//! here; the caller decides whether to skip the minibatch or stop.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NegativeSamplingError {
    /// Array dimensions disagree with what the operation requires.
    #[error("shape mismatch in {operation}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        operation: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A supplied or sampled row index does not address the weight matrix.
    #[error("index {index} out of range for vocabulary of size {vocabulary_size}")]
    IndexOutOfRange {
        index: usize,
        vocabulary_size: usize,
    },

    /// Backward without a matching forward (or a second backward).
    #[error("{layer}: backward called without a preceding forward")]
    StateError { layer: &'static str },

    /// The smoothed unigram table cannot be sampled from.
    #[error("degenerate unigram distribution: {reason}")]
    DegenerateDistribution { reason: String },

    /// A mean over zero rows is undefined.
    #[error("{operation} received an empty batch")]
    EmptyBatch { operation: &'static str },
}

pub type Result<T> = std::result::Result<T, NegativeSamplingError>;
