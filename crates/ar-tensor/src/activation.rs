//! Activation kinds and their scalar reference math.
//!
//! Every backend must agree with the functions here element for element; the
//! CPU backend uses them directly and the Metal kernels mirror them.

use crate::error::{Result, TensorError};

/// Elementwise nonlinearity applied by an activation kernel.
///
/// `Relu` is the plain rectifier that accelerator libraries expose as their
/// RELU mode: negative inputs map to zero in the forward pass and receive no
/// gradient. `LeakyRelu` scales negative inputs (and their gradients) by
/// `negative_slope`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivationKind {
    Sigmoid,
    Tanh,
    Relu,
    LeakyRelu { negative_slope: f32 },
}

impl ActivationKind {
    /// Parse a mode name such as `"SIGMOID"` or `"relu"`.
    ///
    /// Matching is case-insensitive. `negative_slope` is only consulted for
    /// leaky ReLU.
    pub fn parse(name: &str, negative_slope: f32) -> Result<Self> {
        let kind = match name.to_ascii_uppercase().as_str() {
            "SIGMOID" => ActivationKind::Sigmoid,
            "TANH" => ActivationKind::Tanh,
            "RELU" => ActivationKind::Relu,
            "LEAKY_RELU" | "LEAKYRELU" => ActivationKind::LeakyRelu { negative_slope },
            _ => {
                return Err(TensorError::InvalidActivation(format!(
                    "unknown activation type '{}'",
                    name
                )))
            }
        };
        kind.validate()?;
        Ok(kind)
    }

    /// Canonical upper-case mode name.
    pub fn name(&self) -> &'static str {
        match self {
            ActivationKind::Sigmoid => "SIGMOID",
            ActivationKind::Tanh => "TANH",
            ActivationKind::Relu => "RELU",
            ActivationKind::LeakyRelu { .. } => "LEAKY_RELU",
        }
    }

    /// Rejects parameters no kernel can honour (a non-finite slope).
    pub fn validate(&self) -> Result<()> {
        if let ActivationKind::LeakyRelu { negative_slope } = self {
            if !negative_slope.is_finite() {
                return Err(TensorError::InvalidActivation(format!(
                    "negative_slope must be finite, got {}",
                    negative_slope
                )));
            }
        }
        Ok(())
    }

    /// Slope applied to the negative branch, 0 for the plain rectifier.
    pub fn negative_slope(&self) -> f32 {
        match self {
            ActivationKind::LeakyRelu { negative_slope } => *negative_slope,
            _ => 0.0,
        }
    }

    /// Forward value for a single element.
    #[inline]
    pub fn forward(&self, x: f32) -> f32 {
        match *self {
            ActivationKind::Sigmoid => sigmoid(x),
            ActivationKind::Tanh => x.tanh(),
            ActivationKind::Relu => {
                if x >= 0.0 {
                    x
                } else {
                    0.0
                }
            }
            ActivationKind::LeakyRelu { negative_slope } => {
                if x >= 0.0 {
                    x
                } else {
                    negative_slope * x
                }
            }
        }
    }

    /// Input gradient for a single element.
    ///
    /// `x` is the forward input, `y` the forward output and `dy` the upstream
    /// gradient. Sigmoid and tanh read `y`; the rectifiers read `x` and send
    /// `x == 0` down the non-positive branch.
    #[inline]
    pub fn backward(&self, x: f32, y: f32, dy: f32) -> f32 {
        match *self {
            ActivationKind::Sigmoid => dy * y * (1.0 - y),
            ActivationKind::Tanh => dy * (1.0 - y * y),
            ActivationKind::Relu => {
                if x > 0.0 {
                    dy
                } else {
                    0.0
                }
            }
            ActivationKind::LeakyRelu { negative_slope } => {
                if x > 0.0 {
                    dy
                } else {
                    dy * negative_slope
                }
            }
        }
    }
}

/// Logistic sigmoid that never evaluates `exp` of a large positive argument.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
