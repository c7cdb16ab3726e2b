use thiserror::Error;

/// Error type for matrix construction and factorization.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinalgError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Index out of bounds: ({row}, {col}) for a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("SVD failed to converge after {sweeps} sweeps")]
    NoConvergence { sweeps: usize },

    #[error("Matrix contains NaN or infinite entries")]
    NonFinite,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type LinalgResult<T> = Result<T, LinalgError>;
