use std::fmt::{self, Debug};

use crate::activation::ActivationKind;
use crate::error::Result;
use crate::storage::Storage;

/// Device class a backend allocates on and computes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host memory, host execution.
    Cpu,
    /// Apple GPU through Metal.
    Metal,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Metal => write!(f, "metal"),
        }
    }
}

/// Trait for pluggable compute backends (CPU, Metal, etc.).
///
/// A backend owns one device class. It allocates `Storage` there, moves data
/// between that storage and host slices, and runs activation kernels over
/// storage it allocated. Every call is synchronous: when it returns, the
/// result is complete and visible to the next call.
///
/// Storage allocated by a different backend is rejected with
/// `TensorError::DeviceMismatch`.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu", "metal").
    fn name(&self) -> &str;

    /// Device class this backend allocates on.
    fn device(&self) -> Device;

    /// Allocate zero-filled storage for `n` f32 elements.
    fn alloc(&self, n: usize) -> Result<Storage>;

    /// Copy `src` into `dst`. Lengths must match exactly.
    fn copy_from_host(&self, dst: &mut Storage, src: &[f32]) -> Result<()>;

    /// Copy the contents of `src` out to a host vector.
    fn copy_to_host(&self, src: &Storage) -> Result<Vec<f32>>;

    /// Apply `kind` to every element of `x`, returning new storage.
    fn activation_forward(&self, kind: ActivationKind, x: &Storage) -> Result<Storage>;

    /// Input gradient for `kind`.
    ///
    /// - `x`: forward input
    /// - `y`: forward output
    /// - `dy`: gradient with respect to the output
    ///
    /// All three must have the same length.
    fn activation_backward(
        &self,
        kind: ActivationKind,
        x: &Storage,
        y: &Storage,
        dy: &Storage,
    ) -> Result<Storage>;
}
