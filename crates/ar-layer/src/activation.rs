use ar_tensor::{ActivationKind, DType, Shape, Tensor, TensorError};

use crate::config::LayerConf;
use crate::error::{LayerError, Result};
use crate::layer::{Layer, Phase};

/// Copies of the tensors seen by a training forward pass.
///
/// The caller keeps ownership of its input, so the cache holds its own copy
/// and is unaffected by later writes to the caller's tensor.
///
/// Sigmoid and tanh gradients are written in terms of `output`; the
/// rectifiers branch on `input`.
#[derive(Debug, Clone)]
struct ForwardCache {
    input: Tensor,
    output: Tensor,
}

/// Elementwise activation layer.
///
/// Runs on whichever device the input tensor lives on; the output and the
/// input gradient are allocated on that same device.
///
/// Lifecycle: a fresh layer is unconfigured. `setup` or `configure` selects
/// the activation. A `Phase::Train` forward pass caches its input and output,
/// after which `backward` may be called any number of times. Reconfiguring
/// discards the cache.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    name: String,
    kind: Option<ActivationKind>,
    negative_slope: f32,
    in_shape: Option<Shape>,
    cache: Option<ForwardCache>,
}

impl Activation {
    /// Create an unconfigured activation layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer already configured with `kind`.
    pub fn with_kind(kind: ActivationKind) -> Result<Self> {
        let mut layer = Self::new();
        layer.configure(kind)?;
        Ok(layer)
    }

    /// Select the activation, dropping cached state and any expected input
    /// length from an earlier `setup`.
    pub fn configure(&mut self, kind: ActivationKind) -> Result<()> {
        kind.validate().map_err(|e| match e {
            TensorError::InvalidActivation(msg) => LayerError::InvalidConfiguration(msg),
            other => LayerError::Tensor(other),
        })?;
        self.kind = Some(kind);
        self.negative_slope = kind.negative_slope();
        self.in_shape = None;
        self.cache = None;
        log::debug!("activation '{}' configured as {}", self.name, kind.name());
        Ok(())
    }

    /// Prepare for `n` elements of `dtype`.
    ///
    /// Kernels compute in f32 only. When `setup` recorded an input shape, `n`
    /// must agree with it; otherwise `n` becomes the expected length.
    pub fn init_backend(&mut self, n: usize, dtype: DType) -> Result<()> {
        if self.kind.is_none() {
            return Err(LayerError::NotConfigured);
        }
        if !dtype.is_compute_type() {
            return Err(TensorError::UnsupportedDType(format!(
                "activation kernels compute in f32, got {}",
                dtype
            ))
            .into());
        }
        match &self.in_shape {
            Some(shape) => check_len(shape.numel(), n)?,
            None => self.in_shape = Some(Shape::vector(n)),
        }
        Ok(())
    }

    /// The configured activation, if any.
    pub fn kind(&self) -> Option<ActivationKind> {
        self.kind
    }

    /// Upper-case mode name, e.g. `"SIGMOID"`.
    pub fn mode(&self) -> Option<&'static str> {
        self.kind.map(|k| k.name())
    }

    /// Negative slope from the configuration.
    ///
    /// For `RELU` this is the configured value even though the rectifier
    /// does not apply it.
    pub fn negative_slope(&self) -> f32 {
        self.negative_slope
    }

    /// Instance name from the configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when a training forward pass is cached for backward.
    pub fn is_forwarded(&self) -> bool {
        self.cache.is_some()
    }
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(LayerError::LengthMismatch { expected, got });
    }
    Ok(())
}

impl Layer for Activation {
    fn layer_type(&self) -> &'static str {
        "Activation"
    }

    fn setup(&mut self, in_shape: &Shape, conf: &LayerConf) -> Result<()> {
        let kind = conf.activation_kind()?;
        self.name = conf.name.clone();
        self.configure(kind)?;
        self.negative_slope = conf.negative_slope();
        self.in_shape = Some(in_shape.clone());
        Ok(())
    }

    fn forward(&mut self, phase: Phase, input: &Tensor) -> Result<Tensor> {
        let kind = self.kind.ok_or(LayerError::NotConfigured)?;
        if let Some(shape) = &self.in_shape {
            check_len(shape.numel(), input.size())?;
        }
        let output = input.activation_forward(kind)?;
        self.cache = match phase {
            Phase::Train => Some(ForwardCache {
                input: input.try_clone()?,
                output: output.try_clone()?,
            }),
            Phase::Eval => None,
        };
        Ok(output)
    }

    /// The phase has no effect here: only the phase of the forward pass
    /// decides whether there is a cache to differentiate against.
    fn backward(&mut self, _phase: Phase, grad: &Tensor) -> Result<(Tensor, Vec<Tensor>)> {
        let kind = self.kind.ok_or(LayerError::NotConfigured)?;
        let cache = self.cache.as_ref().ok_or(LayerError::MissingForward)?;
        check_len(cache.output.size(), grad.size())?;
        let input_grad = grad.activation_backward(kind, &cache.input, &cache.output)?;
        Ok((input_grad, Vec::new()))
    }

    fn reset(&mut self) {
        self.cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_tensor::{ComputeBackend, CpuBackend};
    use std::sync::Arc;

    fn tensor(data: &[f32]) -> Tensor {
        let cpu: Arc<dyn ComputeBackend> = Arc::new(CpuBackend::new());
        Tensor::from_host(data, Shape::vector(data.len()), cpu).unwrap()
    }

    #[test]
    fn test_unconfigured_forward() {
        let mut acti = Activation::new();
        assert_eq!(acti.mode(), None);
        assert!(matches!(
            acti.forward(Phase::Train, &tensor(&[1.0])),
            Err(LayerError::NotConfigured)
        ));
    }

    #[test]
    fn test_setup_records_conf() {
        let mut acti = Activation::new();
        let conf = LayerConf::new("RELU").with_name("r").with_negative_slope(0.5);
        acti.setup(&Shape::vector(3), &conf).unwrap();
        assert_eq!(acti.layer_type(), "Activation");
        assert_eq!(acti.mode(), Some("RELU"));
        assert_eq!(acti.negative_slope(), 0.5);
        assert_eq!(acti.name(), "r");
        assert!(!acti.is_forwarded());
    }

    #[test]
    fn test_setup_rejects_unknown_type() {
        let mut acti = Activation::new();
        let err = acti
            .setup(&Shape::vector(3), &LayerConf::new("SWISH"))
            .unwrap_err();
        assert!(matches!(err, LayerError::InvalidConfiguration(_)));
        assert_eq!(acti.kind(), None);
    }

    #[test]
    fn test_configure_rejects_nan_slope() {
        let kind = ActivationKind::LeakyRelu {
            negative_slope: f32::NAN,
        };
        assert!(matches!(
            Activation::with_kind(kind),
            Err(LayerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_forward_length_checked_against_setup() {
        let mut acti = Activation::new();
        acti.setup(&Shape::vector(4), &LayerConf::new("TANH")).unwrap();
        assert!(matches!(
            acti.forward(Phase::Train, &tensor(&[1.0, 2.0])),
            Err(LayerError::LengthMismatch { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn test_backward_without_forward() {
        let mut acti = Activation::with_kind(ActivationKind::Sigmoid).unwrap();
        assert!(matches!(
            acti.backward(Phase::Train, &tensor(&[1.0])),
            Err(LayerError::MissingForward)
        ));
    }

    #[test]
    fn test_backward_length_mismatch() {
        let mut acti = Activation::with_kind(ActivationKind::Tanh).unwrap();
        acti.forward(Phase::Train, &tensor(&[0.1, 0.2, 0.3])).unwrap();
        assert!(matches!(
            acti.backward(Phase::Train, &tensor(&[1.0, 1.0])),
            Err(LayerError::LengthMismatch { expected: 3, got: 2 })
        ));
        // The failed call leaves the cache usable.
        assert!(acti.backward(Phase::Train, &tensor(&[1.0; 3])).is_ok());
    }

    #[test]
    fn test_eval_forward_does_not_cache() {
        let mut acti = Activation::with_kind(ActivationKind::Relu).unwrap();
        acti.forward(Phase::Train, &tensor(&[1.0])).unwrap();
        assert!(acti.is_forwarded());
        acti.forward(Phase::Eval, &tensor(&[1.0])).unwrap();
        assert!(!acti.is_forwarded());
        assert!(matches!(
            acti.backward(Phase::Train, &tensor(&[1.0])),
            Err(LayerError::MissingForward)
        ));
    }

    #[test]
    fn test_reconfigure_discards_cache() {
        let mut acti = Activation::with_kind(ActivationKind::Relu).unwrap();
        acti.forward(Phase::Train, &tensor(&[1.0, -1.0])).unwrap();
        acti.configure(ActivationKind::Sigmoid).unwrap();
        assert!(!acti.is_forwarded());
        assert!(acti.backward(Phase::Train, &tensor(&[1.0, 1.0])).is_err());
    }

    #[test]
    fn test_reset_discards_cache() {
        let mut acti = Activation::with_kind(ActivationKind::Tanh).unwrap();
        acti.forward(Phase::Train, &tensor(&[0.5])).unwrap();
        acti.reset();
        assert!(!acti.is_forwarded());
    }

    #[test]
    fn test_init_backend() {
        let mut acti = Activation::new();
        assert!(matches!(
            acti.init_backend(3, DType::F32),
            Err(LayerError::NotConfigured)
        ));
        acti.setup(&Shape::vector(3), &LayerConf::new("SIGMOID"))
            .unwrap();
        assert!(acti.init_backend(3, DType::F32).is_ok());
        assert!(matches!(
            acti.init_backend(4, DType::F32),
            Err(LayerError::LengthMismatch { expected: 3, got: 4 })
        ));
        assert!(matches!(
            acti.init_backend(3, DType::F16),
            Err(LayerError::Tensor(TensorError::UnsupportedDType(_)))
        ));
    }

    #[test]
    fn test_backward_has_no_param_grads() {
        let mut acti = Activation::with_kind(ActivationKind::Sigmoid).unwrap();
        acti.forward(Phase::Train, &tensor(&[0.0])).unwrap();
        let (dx, params) = acti.backward(Phase::Train, &tensor(&[1.0])).unwrap();
        assert!(params.is_empty());
        // sigmoid'(0) = 0.25
        assert_eq!(dx.to_host().unwrap(), vec![0.25]);
    }

    #[test]
    fn test_backward_phase_does_not_matter() {
        let mut acti = Activation::with_kind(ActivationKind::Sigmoid).unwrap();
        acti.forward(Phase::Train, &tensor(&[-1.0, 0.5])).unwrap();
        let grad = tensor(&[1.0, -2.0]);
        let (train, _) = acti.backward(Phase::Train, &grad).unwrap();
        let (eval, _) = acti.backward(Phase::Eval, &grad).unwrap();
        assert_eq!(train.to_host().unwrap(), eval.to_host().unwrap());
    }

    #[test]
    fn test_cache_survives_input_overwrite() {
        let x = [2.0, -1.0, 0.5];
        let mut input = tensor(&x);
        let mut acti = Activation::with_kind(ActivationKind::Relu).unwrap();
        acti.forward(Phase::Train, &input).unwrap();
        input.copy_from_host(&[-1.0, 1.0, -1.0]).unwrap();
        let (dx, _) = acti.backward(Phase::Train, &tensor(&[3.0, 3.0, 3.0])).unwrap();
        assert_eq!(dx.to_host().unwrap(), vec![3.0, 0.0, 3.0]);
    }

    #[cfg(feature = "metal")]
    #[test]
    fn test_cache_survives_input_overwrite_on_metal() {
        let Some(metal) = ar_tensor::MetalBackend::new() else {
            return;
        };
        let metal: Arc<dyn ComputeBackend> = Arc::new(metal);
        let on_metal =
            |data: &[f32]| Tensor::from_host(data, Shape::vector(data.len()), Arc::clone(&metal)).unwrap();

        let mut input = on_metal(&[2.0, -1.0, 0.5]);
        let mut acti = Activation::with_kind(ActivationKind::Relu).unwrap();
        acti.forward(Phase::Train, &input).unwrap();
        input.copy_from_host(&[-1.0, 1.0, -1.0]).unwrap();
        let (dx, _) = acti.backward(Phase::Train, &on_metal(&[3.0, 3.0, 3.0])).unwrap();
        assert_eq!(dx.to_host().unwrap(), vec![3.0, 0.0, 3.0]);
    }
}
