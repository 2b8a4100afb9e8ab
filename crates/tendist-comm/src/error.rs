//! Error types for the message-passing fabric.

use thiserror::Error;

/// Errors produced by point-to-point and collective operations.
///
/// All of these are fatal to the process group: the SPMD model gives no
/// way to retry a collective on one rank without deadlocking the rest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("rank {rank} out of range for communicator of size {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("{operation}: message of {received} elements exceeds receive buffer of {capacity}")]
    TruncatedMessage {
        operation: String,
        received: usize,
        capacity: usize,
    },

    #[error("{operation}: received element type does not match the receive buffer type")]
    TypeMismatch { operation: String },

    #[error("{operation}: expected {expected} counts, got {actual}")]
    CountMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("{operation}: buffer of {actual} elements, expected {expected}")]
    BufferMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("{operation}: root rank required to supply a buffer")]
    MissingRootBuffer { operation: String },
}

/// Result type for fabric operations.
pub type CommResult<T> = Result<T, CommError>;

impl CommError {
    pub(crate) fn truncated(operation: &str, received: usize, capacity: usize) -> Self {
        CommError::TruncatedMessage {
            operation: operation.into(),
            received,
            capacity,
        }
    }

    pub(crate) fn counts(operation: &str, expected: usize, actual: usize) -> Self {
        CommError::CountMismatch {
            operation: operation.into(),
            expected,
            actual,
        }
    }

    pub(crate) fn buffer(operation: &str, expected: usize, actual: usize) -> Self {
        CommError::BufferMismatch {
            operation: operation.into(),
            expected,
            actual,
        }
    }
}
