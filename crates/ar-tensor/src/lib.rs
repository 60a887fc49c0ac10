//! `ar-tensor` - Device buffers and activation kernels for actirt.
//!
//! This crate provides:
//! - A `Tensor` type whose storage lives on the device of its backend
//! - A `ComputeBackend` trait for pluggable devices (CPU, Metal)
//! - A reference `CpuBackend` implementation
//! - The `ActivationKind` sum type and its scalar reference math
//! - Shape utilities and data type definitions

pub mod activation;
pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
#[cfg(feature = "metal")]
pub mod metal;
pub mod shape;
pub mod storage;
pub mod tensor;

use std::sync::Arc;

// Re-export primary types at the crate root for convenience.
pub use activation::ActivationKind;
pub use backend::{ComputeBackend, Device};
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
#[cfg(feature = "metal")]
pub use metal::MetalBackend;
pub use shape::Shape;
pub use storage::{CpuStorage, Storage};
pub use tensor::Tensor;

/// Best available backend: Metal when compiled in and a device is present,
/// otherwise the CPU backend.
pub fn default_backend() -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "metal")]
    {
        if let Some(metal) = MetalBackend::new() {
            return Arc::new(metal);
        }
        log::warn!("metal backend unavailable, falling back to cpu");
    }
    Arc::new(CpuBackend::new())
}
