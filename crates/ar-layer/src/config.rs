use ar_tensor::{ActivationKind, TensorError};

use crate::error::{LayerError, Result};

/// Parameters specific to the rectifier family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReluConf {
    /// Slope applied to negative inputs by leaky ReLU. Default 0.
    pub negative_slope: f32,
}

impl Default for ReluConf {
    fn default() -> Self {
        ReluConf {
            negative_slope: 0.0,
        }
    }
}

/// Configuration record for a layer.
///
/// `layer_type` selects the activation (`"SIGMOID"`, `"TANH"`, `"RELU"`,
/// `"LEAKY_RELU"`), matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerConf {
    /// Optional instance name, used in log messages.
    pub name: String,
    /// Activation type name.
    pub layer_type: String,
    /// Rectifier parameters, if any were given.
    pub relu_conf: Option<ReluConf>,
}

impl LayerConf {
    /// Create a configuration for the given activation type.
    pub fn new(layer_type: impl Into<String>) -> Self {
        LayerConf {
            name: String::new(),
            layer_type: layer_type.into(),
            relu_conf: None,
        }
    }

    /// Set the instance name. Returns self for builder-style usage.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the rectifier negative slope. Returns self for builder-style usage.
    pub fn with_negative_slope(mut self, negative_slope: f32) -> Self {
        self.relu_conf = Some(ReluConf { negative_slope });
        self
    }

    /// Negative slope from `relu_conf`, or the default when absent.
    pub fn negative_slope(&self) -> f32 {
        self.relu_conf.unwrap_or_default().negative_slope
    }

    /// Resolve the activation kind this configuration names.
    ///
    /// Unknown type names and non-finite slopes are rejected here, so a bad
    /// configuration never reaches forward or backward.
    pub fn activation_kind(&self) -> Result<ActivationKind> {
        let slope = self.negative_slope();
        if !slope.is_finite() {
            return Err(LayerError::InvalidConfiguration(format!(
                "negative_slope must be finite, got {}",
                slope
            )));
        }
        ActivationKind::parse(&self.layer_type, slope).map_err(|e| match e {
            TensorError::InvalidActivation(msg) => LayerError::InvalidConfiguration(msg),
            other => LayerError::Tensor(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let conf = LayerConf::new("RELU")
            .with_name("relu1")
            .with_negative_slope(0.5);
        assert_eq!(conf.name, "relu1");
        assert_eq!(conf.layer_type, "RELU");
        assert_eq!(conf.negative_slope(), 0.5);
    }

    #[test]
    fn test_default_slope() {
        assert_eq!(LayerConf::new("LEAKY_RELU").negative_slope(), 0.0);
    }

    #[test]
    fn test_activation_kind() {
        assert_eq!(
            LayerConf::new("sigmoid").activation_kind().unwrap(),
            ActivationKind::Sigmoid
        );
        assert_eq!(
            LayerConf::new("LeakyReLU")
                .with_negative_slope(0.25)
                .activation_kind()
                .unwrap(),
            ActivationKind::LeakyRelu {
                negative_slope: 0.25
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(
            LayerConf::new("GELU").activation_kind(),
            Err(LayerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_non_finite_slope() {
        let conf = LayerConf::new("RELU").with_negative_slope(f32::INFINITY);
        assert!(matches!(
            conf.activation_kind(),
            Err(LayerError::InvalidConfiguration(_))
        ));
    }
}
