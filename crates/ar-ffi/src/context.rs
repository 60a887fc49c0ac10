use std::sync::Arc;

use ar_layer::{Activation, Layer, Phase};
use ar_tensor::{ComputeBackend, CpuBackend, Shape, Tensor};

use crate::types::ARBackendType;

/// Opaque handle owning an activation layer and the backend its tensors
/// live on.
pub struct ARActivation {
    pub backend: Arc<dyn ComputeBackend>,
    pub layer: Activation,
}

impl ARActivation {
    pub fn new(backend: ARBackendType, layer: Activation) -> Self {
        let backend: Arc<dyn ComputeBackend> = match backend {
            ARBackendType::Cpu => Arc::new(CpuBackend::new()),
            ARBackendType::Default => ar_tensor::default_backend(),
        };
        Self { backend, layer }
    }

    /// Upload `x`, run a training forward pass and return the host output.
    pub fn forward(&mut self, x: &[f32]) -> ar_layer::Result<Vec<f32>> {
        let input = Tensor::from_host(x, Shape::vector(x.len()), Arc::clone(&self.backend))?;
        let output = self.layer.forward(Phase::Train, &input)?;
        Ok(output.to_host()?)
    }

    /// Upload `dy`, run backward against the cached forward pass and return
    /// the host input gradient.
    pub fn backward(&mut self, dy: &[f32]) -> ar_layer::Result<Vec<f32>> {
        let grad = Tensor::from_host(dy, Shape::vector(dy.len()), Arc::clone(&self.backend))?;
        let (dx, _) = self.layer.backward(Phase::Train, &grad)?;
        Ok(dx.to_host()?)
    }
}
