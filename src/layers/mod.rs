pub mod activation;
pub mod feed_forward;
pub mod glu;
pub mod linear;
pub mod mlp;

pub use activation::{Activation, get_activation_fn};
pub use feed_forward::FeedForward;
pub use glu::Glu;
pub use linear::Linear;
pub use mlp::Mlp;
