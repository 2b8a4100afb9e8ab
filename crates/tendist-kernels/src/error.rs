//! Error types for tensor kernel operations.

use tendist_comm::CommError;
use tendist_core::CoreError;
use thiserror::Error;

/// Error type for the distributed kernels.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("invalid mode {mode}: tensor has order {order}")]
    InvalidMode { mode: usize, order: usize },

    #[error("{operation}: got shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        operation: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{operation}: operand is {distribution}-distributed, which this kernel does not cover")]
    UnsupportedDistribution {
        operation: String,
        distribution: &'static str,
    },

    #[error("{operation}: operands carry different partitions {left:?} and {right:?}")]
    PartitionMismatch {
        operation: String,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("{operation}: expected a matrix, got an order-{order} tensor")]
    NotAMatrix { operation: String, order: usize },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] CommError),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    pub fn invalid_mode(mode: usize, order: usize) -> Self {
        KernelError::InvalidMode { mode, order }
    }

    pub fn shape_mismatch(operation: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        KernelError::ShapeMismatch {
            operation: operation.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    pub fn unsupported(operation: impl Into<String>, distribution: &'static str) -> Self {
        KernelError::UnsupportedDistribution {
            operation: operation.into(),
            distribution,
        }
    }

    pub fn not_a_matrix(operation: impl Into<String>, order: usize) -> Self {
        KernelError::NotAMatrix {
            operation: operation.into(),
            order,
        }
    }
}
