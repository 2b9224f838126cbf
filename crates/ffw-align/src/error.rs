use thiserror::Error;

use crate::dtype::DType;

pub type BufferResult<T> = Result<T, BufferError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch { expected: DType, actual: DType },
    #[error("cannot cast {from} to {to} without discarding the imaginary part")]
    UnsafeCast { from: DType, to: DType },
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },
}

impl BufferError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
