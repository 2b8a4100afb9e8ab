//! Error types for distributions and tensors.

use tendist_comm::CommError;
use thiserror::Error;

/// Errors raised by the distribution and tensor layers.
///
/// Every one of these is fatal to the run: the SPMD model cannot
/// recover on one rank without desynchronising the collectives on the
/// others, so callers report and terminate.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Shape/partition mismatch, bad grid size, mode out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An operation was called with a distribution it does not cover.
    #[error("{operation}: unsupported distribution {distribution}")]
    UnsupportedDistribution {
        operation: String,
        distribution: &'static str,
    },

    #[error("{operation}: got shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        operation: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("mode {mode} out of range for order-{order} tensor")]
    InvalidMode { mode: usize, order: usize },

    /// Failure in the underlying message-passing fabric.
    #[error(transparent)]
    Transport(#[from] CommError),
}

/// Result type for distribution/tensor operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        CoreError::InvalidConfiguration(msg.into())
    }

    pub fn unsupported(operation: impl Into<String>, distribution: &'static str) -> Self {
        CoreError::UnsupportedDistribution {
            operation: operation.into(),
            distribution,
        }
    }

    pub fn shape_mismatch(
        operation: impl Into<String>,
        expected: &[usize],
        actual: &[usize],
    ) -> Self {
        CoreError::ShapeMismatch {
            operation: operation.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
