use thiserror::Error;

use super::types::TensorType;

/// Errors raised by the tensor primitives (construction, matmul, gating)
/// Layers surface these unchanged from `forward`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("Trailing dimension {actual} doesn't match expected dimension {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Tensor '{name}': data length {len} doesn't match shape {dimensions:?}")]
    DataLength {
        name: String,
        dimensions: Vec<usize>,
        len: usize,
    },

    #[error("Tensor '{name}' must have at least one dimension")]
    Scalar { name: String },

    #[error("Weight tensor '{name}' must be 2D, got {rank}D")]
    NotMatrix { name: String, rank: usize },

    #[error("Bias length {actual} doesn't match output dimension {expected}")]
    BiasLength { expected: usize, actual: usize },

    #[error("Cannot split dimension {dim} into two equal halves of {width}")]
    OddSplit { dim: usize, width: usize },

    #[error("Expected {expected:?} data, tensor '{name}' holds {actual:?}")]
    UnsupportedType {
        name: String,
        expected: TensorType,
        actual: TensorType,
    },

    #[error("Feature width '{what}' must be positive")]
    ZeroWidth { what: &'static str },

    #[error("Feature width '{what}' overflows usize")]
    WidthOverflow { what: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("Unknown activation function: '{0}'")]
    Unknown(String),
}

/// Crate-level error for construction, config and state-dict paths
#[derive(Debug, Error)]
pub enum FfnError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error("Missing parameter '{0}' in state dict")]
    MissingParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
