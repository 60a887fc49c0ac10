use std::sync::Arc;

use half::f16;

use crate::activation::ActivationKind;
use crate::backend::{ComputeBackend, Device};
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::Storage;

/// A tensor resident on the device of its backend.
///
/// Holds contiguous, row-major f32 data with an associated shape. The element
/// count is fixed at creation. Computation and host transfers are dispatched
/// to the `ComputeBackend` that allocated the storage.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Storage,
    shape: Shape,
    backend: Arc<dyn ComputeBackend>,
}

impl Tensor {
    /// Allocate a zero-filled tensor of `shape` on `backend`'s device.
    pub fn new(shape: Shape, backend: Arc<dyn ComputeBackend>) -> Result<Self> {
        let storage = backend.alloc(shape.numel())?;
        Ok(Tensor {
            storage,
            shape,
            backend,
        })
    }

    /// Allocate on `backend` and fill from host data.
    ///
    /// `data.len()` must equal `shape.numel()`.
    pub fn from_host(data: &[f32], shape: Shape, backend: Arc<dyn ComputeBackend>) -> Result<Self> {
        shape.check_numel(data.len())?;
        let mut t = Tensor::new(shape, backend)?;
        t.copy_from_host(data)?;
        Ok(t)
    }

    /// Overwrite every element from a host slice of the same length.
    pub fn copy_from_host(&mut self, data: &[f32]) -> Result<()> {
        self.backend.copy_from_host(&mut self.storage, data)
    }

    /// Overwrite every element from half-precision host data, widening to f32.
    pub fn copy_from_host_f16(&mut self, data: &[f16]) -> Result<()> {
        let widened: Vec<f32> = data.iter().map(|v| v.to_f32()).collect();
        self.copy_from_host(&widened)
    }

    /// Copy all elements out to host memory.
    pub fn to_host(&self) -> Result<Vec<f32>> {
        self.backend.copy_to_host(&self.storage)
    }

    /// Copy all elements out to host memory, narrowing to f16.
    pub fn to_host_f16(&self) -> Result<Vec<f16>> {
        Ok(self.to_host()?.into_iter().map(f16::from_f32).collect())
    }

    /// Borrow the elements in place. Only host tensors can do this.
    pub fn as_host_slice(&self) -> Result<&[f32]> {
        Ok(self.storage.as_cpu()?.as_f32_slice())
    }

    /// Read a single element in place.
    pub fn get(&self, index: usize) -> Result<f32> {
        self.storage.get(index).ok_or_else(|| {
            TensorError::Other(format!(
                "index {} out of bounds for tensor of {} elements",
                index,
                self.size()
            ))
        })
    }

    /// Copy the tensor into new storage on the same device.
    ///
    /// The copy is independent of `self`: later writes to either one are not
    /// seen by the other. Allocation failure is returned as an error.
    pub fn try_clone(&self) -> Result<Tensor> {
        Ok(Tensor {
            storage: self.storage.try_clone()?,
            shape: self.shape.clone(),
            backend: Arc::clone(&self.backend),
        })
    }

    /// Move the tensor to `backend`'s device.
    ///
    /// Blocks until the transfer completes. A tensor already on that device
    /// class is left untouched.
    pub fn to_device(&mut self, backend: Arc<dyn ComputeBackend>) -> Result<()> {
        if backend.device() == self.device() {
            return Ok(());
        }
        let host = self.to_host()?;
        let mut storage = backend.alloc(host.len())?;
        backend.copy_from_host(&mut storage, &host)?;
        log::debug!(
            "moved tensor {} from {} to {}",
            self.shape,
            self.backend.name(),
            backend.name()
        );
        self.storage = storage;
        self.backend = backend;
        Ok(())
    }

    /// Reshape the tensor, returning a copy of the data under a different
    /// shape.
    ///
    /// The total number of elements must remain the same.
    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if self.shape.numel() != new_shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: new_shape.dims().to_vec(),
            });
        }
        Ok(Tensor {
            storage: self.storage.try_clone()?,
            shape: new_shape,
            backend: Arc::clone(&self.backend),
        })
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.shape.numel()
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        DType::F32
    }

    /// Device class holding the elements.
    pub fn device(&self) -> Device {
        self.backend.device()
    }

    /// Backend the tensor dispatches to.
    pub fn backend(&self) -> &Arc<dyn ComputeBackend> {
        &self.backend
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Apply `kind` elementwise, producing a tensor of the same shape on the
    /// same device.
    pub fn activation_forward(&self, kind: ActivationKind) -> Result<Tensor> {
        let storage = self.backend.activation_forward(kind, &self.storage)?;
        Ok(Tensor {
            storage,
            shape: self.shape.clone(),
            backend: Arc::clone(&self.backend),
        })
    }

    /// Treat `self` as the output gradient and compute the input gradient of
    /// `kind`, given the forward `input` and `output`.
    pub fn activation_backward(
        &self,
        kind: ActivationKind,
        input: &Tensor,
        output: &Tensor,
    ) -> Result<Tensor> {
        for other in [input, output] {
            if other.device() != self.device() {
                return Err(TensorError::DeviceMismatch {
                    expected: other.device().to_string(),
                    got: self.device().to_string(),
                });
            }
        }
        if self.size() != output.size() {
            return Err(TensorError::LengthMismatch {
                expected: output.size(),
                got: self.size(),
            });
        }
        let storage =
            self.backend
                .activation_backward(kind, &input.storage, &output.storage, &self.storage)?;
        Ok(Tensor {
            storage,
            shape: self.shape.clone(),
            backend: Arc::clone(&self.backend),
        })
    }
}
