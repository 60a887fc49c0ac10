use crate::backend::Device;
use crate::error::{Result, TensorError};
#[cfg(feature = "metal")]
use crate::metal::MetalStorage;

/// CPU-side tensor storage.
#[derive(Debug, Clone)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the data as an f32 slice.
    pub fn as_f32_slice(&self) -> &[f32] {
        match self {
            CpuStorage::F32(v) => v.as_slice(),
        }
    }

    /// Returns the data as a mutable f32 slice.
    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        match self {
            CpuStorage::F32(v) => v.as_mut_slice(),
        }
    }

    /// Create zero-filled storage for `n` elements.
    pub fn zeros(n: usize) -> Self {
        CpuStorage::F32(vec![0.0; n])
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }
}

/// Device-resident element storage.
///
/// One variant per device class. Which backend may touch a given value is
/// decided by its variant, see `Storage::device`. Every value owns its
/// elements; clones are copies.
#[derive(Debug, Clone)]
pub enum Storage {
    Cpu(CpuStorage),
    #[cfg(feature = "metal")]
    Metal(MetalStorage),
}

impl Storage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            Storage::Cpu(s) => s.len(),
            #[cfg(feature = "metal")]
            Storage::Metal(s) => s.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Device class holding the elements.
    pub fn device(&self) -> Device {
        match self {
            Storage::Cpu(_) => Device::Cpu,
            #[cfg(feature = "metal")]
            Storage::Metal(_) => Device::Metal,
        }
    }

    /// Copy the elements into new storage on the same device.
    ///
    /// Unlike `clone`, a failed device allocation is returned as an error.
    pub fn try_clone(&self) -> Result<Self> {
        match self {
            Storage::Cpu(s) => Ok(Storage::Cpu(s.clone())),
            #[cfg(feature = "metal")]
            Storage::Metal(s) => Ok(Storage::Metal(s.try_clone()?)),
        }
    }

    /// Read element `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<f32> {
        match self {
            Storage::Cpu(s) => s.as_f32_slice().get(index).copied(),
            #[cfg(feature = "metal")]
            Storage::Metal(s) => s.as_slice().get(index).copied(),
        }
    }

    /// Borrow host storage, or fail with `DeviceMismatch` for device storage.
    pub fn as_cpu(&self) -> Result<&CpuStorage> {
        match self {
            Storage::Cpu(s) => Ok(s),
            #[allow(unreachable_patterns)]
            other => Err(TensorError::DeviceMismatch {
                expected: Device::Cpu.to_string(),
                got: other.device().to_string(),
            }),
        }
    }

    /// Mutable counterpart of `as_cpu`.
    pub fn as_cpu_mut(&mut self) -> Result<&mut CpuStorage> {
        match self {
            Storage::Cpu(s) => Ok(s),
            #[allow(unreachable_patterns)]
            other => Err(TensorError::DeviceMismatch {
                expected: Device::Cpu.to_string(),
                got: other.device().to_string(),
            }),
        }
    }
}
