pub mod unary;

use crate::activation::ActivationKind;
use crate::backend::{ComputeBackend, Device};
use crate::error::{Result, TensorError};
use crate::storage::{CpuStorage, Storage};

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance. Serves as the reference the
/// accelerator backends are tested against, and as the fallback when no
/// accelerator is present.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(TensorError::LengthMismatch { expected, got });
    }
    Ok(())
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn alloc(&self, n: usize) -> Result<Storage> {
        Ok(Storage::Cpu(CpuStorage::zeros(n)))
    }

    fn copy_from_host(&self, dst: &mut Storage, src: &[f32]) -> Result<()> {
        let dst = dst.as_cpu_mut()?;
        check_len(dst.len(), src.len())?;
        dst.as_f32_slice_mut().copy_from_slice(src);
        Ok(())
    }

    fn copy_to_host(&self, src: &Storage) -> Result<Vec<f32>> {
        Ok(src.as_cpu()?.as_f32_slice().to_vec())
    }

    fn activation_forward(&self, kind: ActivationKind, x: &Storage) -> Result<Storage> {
        kind.validate()?;
        let x = x.as_cpu()?.as_f32_slice();
        log::debug!("cpu activation forward: mode={} n={}", kind.name(), x.len());
        let y = unary::activation_forward(kind, x);
        Ok(Storage::Cpu(CpuStorage::from_f32_vec(y)))
    }

    fn activation_backward(
        &self,
        kind: ActivationKind,
        x: &Storage,
        y: &Storage,
        dy: &Storage,
    ) -> Result<Storage> {
        kind.validate()?;
        let x = x.as_cpu()?.as_f32_slice();
        let y = y.as_cpu()?.as_f32_slice();
        let dy = dy.as_cpu()?.as_f32_slice();
        check_len(x.len(), y.len())?;
        check_len(x.len(), dy.len())?;
        log::debug!("cpu activation backward: mode={} n={}", kind.name(), x.len());
        let dx = unary::activation_backward(kind, x, y, dy);
        Ok(Storage::Cpu(CpuStorage::from_f32_vec(dx)))
    }
}
