use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("layer used before setup/configure")]
    NotConfigured,
    #[error("backward called without a preceding training forward pass")]
    MissingForward,
    #[error("length mismatch: expected {expected} elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("tensor error: {0}")]
    Tensor(#[from] ar_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, LayerError>;
