//! Feed-forward sublayers for transformer blocks
//!
//! - `layers::Mlp`: up-projection, activation, down-projection
//! - `layers::Glu`: fused up/gate projection, gated product, down-projection

pub mod config;
pub mod core;
pub mod layers;
pub mod ops;

pub use crate::config::{FfnConfig, FfnKind, StateDict, WeightType};
pub use crate::core::error::{ActivationError, FfnError, TensorError};
pub use crate::core::types::{Tensor, TensorType};
pub use crate::layers::{Activation, FeedForward, Glu, Linear, Mlp};
