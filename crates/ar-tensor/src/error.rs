use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("length mismatch: expected {expected} elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("device mismatch: expected {expected}, got {got}")]
    DeviceMismatch { expected: String, got: String },
    #[error("unsupported dtype: {0}")]
    UnsupportedDType(String),
    #[error("invalid activation: {0}")]
    InvalidActivation(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
