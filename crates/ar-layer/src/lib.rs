//! `ar-layer` - Activation layers for actirt.
//!
//! An `Activation` layer applies sigmoid, tanh, ReLU or leaky ReLU to a
//! tensor on its device, caches what its backward pass needs, and computes
//! input gradients from that cache.

pub mod activation;
pub mod config;
pub mod error;
pub mod layer;

pub use activation::Activation;
pub use ar_tensor::ActivationKind;
pub use config::{LayerConf, ReluConf};
pub use error::{LayerError, Result};
pub use layer::{Layer, Phase};
