use ar_tensor::{Shape, Tensor};

use crate::config::LayerConf;

/// Whether a pass is part of training or inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Forward state is kept for a later backward pass.
    Train,
    /// Forward only; nothing is kept.
    Eval,
}

/// Trait for layers with a forward and a backward pass.
///
/// Implementations own whatever forward state their backward pass needs.
/// A layer instance is driven by one caller at a time; use separate
/// instances for concurrent streams of data.
pub trait Layer: Send {
    /// Static name of the layer implementation.
    fn layer_type(&self) -> &'static str;

    /// Configure the layer for inputs of `in_shape`.
    ///
    /// Calling this again reconfigures the layer and drops cached state.
    fn setup(&mut self, in_shape: &Shape, conf: &LayerConf) -> crate::Result<()>;

    /// Compute the output for `input`.
    fn forward(&mut self, phase: Phase, input: &Tensor) -> crate::Result<Tensor>;

    /// Compute the gradient with respect to the input of the last training
    /// forward pass, given the gradient with respect to its output.
    ///
    /// Returns the input gradient and the parameter gradients, in parameter
    /// order.
    fn backward(&mut self, phase: Phase, grad: &Tensor) -> crate::Result<(Tensor, Vec<Tensor>)>;

    /// Drop any cached forward state.
    fn reset(&mut self);
}
