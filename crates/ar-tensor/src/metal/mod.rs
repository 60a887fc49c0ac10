//! Metal GPU compute backend (macOS only).
//!
//! Buffers use shared storage so host transfers are plain memcpys into the
//! buffer contents. Each kernel call encodes one dispatch, commits, and waits
//! for the command buffer to complete before returning.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_foundation::NSString;
use objc2_metal::{
    MTLBuffer, MTLCommandBuffer, MTLCommandEncoder, MTLCommandQueue, MTLComputeCommandEncoder,
    MTLComputePipelineState, MTLCreateSystemDefaultDevice, MTLDevice, MTLLibrary, MTLResource,
    MTLResourceOptions, MTLSize,
};

use crate::activation::ActivationKind;
use crate::backend::{ComputeBackend, Device};
use crate::error::{Result, TensorError};
use crate::storage::Storage;

const SHADER_SOURCE: &str = include_str!("activation.metal");

/// Kernel parameters, laid out as `ActParams` in `activation.metal`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct ActParams {
    mode: u32,
    negative_slope: f32,
    n: u32,
}

impl ActParams {
    fn new(kind: ActivationKind, n: usize) -> Result<Self> {
        let n = u32::try_from(n)
            .map_err(|_| TensorError::Backend(format!("{} elements exceed a Metal grid", n)))?;
        let mode = match kind {
            ActivationKind::Sigmoid => 0,
            ActivationKind::Tanh => 1,
            ActivationKind::Relu => 2,
            ActivationKind::LeakyRelu { .. } => 3,
        };
        Ok(ActParams {
            mode,
            negative_slope: kind.negative_slope(),
            n,
        })
    }
}

/// A shared-storage Metal buffer of f32 elements.
///
/// Each value owns its buffer: cloning allocates a new buffer on the same
/// device and copies the elements, as cloning a `CpuStorage` copies its `Vec`.
pub struct MetalStorage {
    buffer: Retained<ProtocolObject<dyn MTLBuffer>>,
    len: usize,
}

// SAFETY: MTLBuffer objects may be used from any thread. No two
// `MetalStorage` values share a buffer, so reads through `&self` and writes
// through `&mut self` follow the usual borrow rules, and kernels have
// completed before any call that dispatched them returns.
unsafe impl Send for MetalStorage {}
unsafe impl Sync for MetalStorage {}

fn new_shared_buffer(
    device: &ProtocolObject<dyn MTLDevice>,
    n: usize,
) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
    // Zero-length buffers are not allowed, so always reserve one element.
    let bytes = n.max(1) * std::mem::size_of::<f32>();
    device
        .newBufferWithLength_options(bytes, MTLResourceOptions::StorageModeShared)
        .ok_or_else(|| TensorError::Backend(format!("failed to allocate {} bytes", bytes)))
}

impl MetalStorage {
    /// Copy the elements into a newly allocated buffer on the same device.
    pub fn try_clone(&self) -> Result<Self> {
        let device = self.buffer.device();
        let mut copy = MetalStorage {
            buffer: new_shared_buffer(&device, self.len)?,
            len: self.len,
        };
        copy.as_mut_slice().copy_from_slice(self.as_slice());
        Ok(copy)
    }

    /// Number of f32 elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn as_slice(&self) -> &[f32] {
        let ptr = self.buffer.contents().as_ptr() as *const f32;
        // SAFETY: the buffer was allocated with room for at least `len` f32s
        // in shared storage, and no kernel is in flight once a call returns.
        unsafe { std::slice::from_raw_parts(ptr, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        let ptr = self.buffer.contents().as_ptr() as *mut f32;
        // SAFETY: as for `as_slice`; the buffer belongs to this value alone,
        // so `&mut self` is the only access to it.
        unsafe { std::slice::from_raw_parts_mut(ptr, self.len) }
    }
}

impl Clone for MetalStorage {
    /// # Panics
    /// Panics if the device cannot allocate the copy. Use `try_clone` to
    /// handle that case.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(e) => panic!("cloning Metal storage: {}", e),
        }
    }
}

impl fmt::Debug for MetalStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetalStorage").field("len", &self.len).finish()
    }
}

/// Metal backend holding the system default device, one command queue and
/// the compiled activation pipelines.
pub struct MetalBackend {
    device: Retained<ProtocolObject<dyn MTLDevice>>,
    queue: Retained<ProtocolObject<dyn MTLCommandQueue>>,
    forward: Retained<ProtocolObject<dyn MTLComputePipelineState>>,
    backward: Retained<ProtocolObject<dyn MTLComputePipelineState>>,
}

// SAFETY: Metal devices, command queues and pipeline states are documented
// as thread-safe.
unsafe impl Send for MetalBackend {}
unsafe impl Sync for MetalBackend {}

impl fmt::Debug for MetalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetalBackend")
            .field("device", &self.device.name().to_string())
            .finish()
    }
}

fn pipeline(
    device: &ProtocolObject<dyn MTLDevice>,
    library: &ProtocolObject<dyn MTLLibrary>,
    name: &str,
) -> Option<Retained<ProtocolObject<dyn MTLComputePipelineState>>> {
    let function = library.newFunctionWithName(&NSString::from_str(name))?;
    match device.newComputePipelineStateWithFunction_error(&function) {
        Ok(p) => Some(p),
        Err(e) => {
            log::warn!("metal: failed to build pipeline '{}': {}", name, e);
            None
        }
    }
}

impl MetalBackend {
    /// Create a Metal backend on the system default device.
    ///
    /// Returns `None` when no Metal device is available or the activation
    /// shaders fail to compile.
    pub fn new() -> Option<Self> {
        let device = MTLCreateSystemDefaultDevice()?;
        let queue = device.newCommandQueue()?;
        let library = match device
            .newLibraryWithSource_options_error(&NSString::from_str(SHADER_SOURCE), None)
        {
            Ok(lib) => lib,
            Err(e) => {
                log::warn!("metal: shader compilation failed: {}", e);
                return None;
            }
        };
        let forward = pipeline(&device, &library, "activation_forward")?;
        let backward = pipeline(&device, &library, "activation_backward")?;
        log::debug!("metal: using device {}", device.name());
        Some(MetalBackend {
            device,
            queue,
            forward,
            backward,
        })
    }

    fn new_storage(&self, n: usize) -> Result<MetalStorage> {
        let buffer = new_shared_buffer(&self.device, n)?;
        let mut storage = MetalStorage { buffer, len: n };
        storage.as_mut_slice().fill(0.0);
        Ok(storage)
    }

    fn dispatch(
        &self,
        pipeline: &ProtocolObject<dyn MTLComputePipelineState>,
        buffers: &[&ProtocolObject<dyn MTLBuffer>],
        params: ActParams,
    ) -> Result<()> {
        let n = params.n as usize;
        if n == 0 {
            return Ok(());
        }
        let command = self
            .queue
            .commandBuffer()
            .ok_or_else(|| TensorError::Backend("failed to create command buffer".to_string()))?;
        let encoder = command
            .computeCommandEncoder()
            .ok_or_else(|| TensorError::Backend("failed to create compute encoder".to_string()))?;
        encoder.setComputePipelineState(pipeline);
        for (index, buffer) in buffers.iter().enumerate() {
            // SAFETY: every buffer holds at least `n` f32s, the range the
            // kernel touches.
            unsafe { encoder.setBuffer_offset_atIndex(Some(*buffer), 0, index) };
        }
        // SAFETY: `params` is a live `repr(C)` value matching the shader struct.
        unsafe {
            encoder.setBytes_length_atIndex(
                NonNull::from(&params).cast::<c_void>(),
                std::mem::size_of::<ActParams>(),
                buffers.len(),
            )
        };
        let group = pipeline.maxTotalThreadsPerThreadgroup().min(n).max(1);
        encoder.dispatchThreads_threadsPerThreadgroup(
            MTLSize {
                width: n,
                height: 1,
                depth: 1,
            },
            MTLSize {
                width: group,
                height: 1,
                depth: 1,
            },
        );
        encoder.endEncoding();
        command.commit();
        command.waitUntilCompleted();
        Ok(())
    }
}

fn metal_storage(s: &Storage) -> Result<&MetalStorage> {
    match s {
        Storage::Metal(m) => Ok(m),
        other => Err(TensorError::DeviceMismatch {
            expected: Device::Metal.to_string(),
            got: other.device().to_string(),
        }),
    }
}

fn metal_storage_mut(s: &mut Storage) -> Result<&mut MetalStorage> {
    match s {
        Storage::Metal(m) => Ok(m),
        other => Err(TensorError::DeviceMismatch {
            expected: Device::Metal.to_string(),
            got: other.device().to_string(),
        }),
    }
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(TensorError::LengthMismatch { expected, got });
    }
    Ok(())
}

impl ComputeBackend for MetalBackend {
    fn name(&self) -> &str {
        "metal"
    }

    fn device(&self) -> Device {
        Device::Metal
    }

    fn alloc(&self, n: usize) -> Result<Storage> {
        Ok(Storage::Metal(self.new_storage(n)?))
    }

    fn copy_from_host(&self, dst: &mut Storage, src: &[f32]) -> Result<()> {
        let dst = metal_storage_mut(dst)?;
        check_len(dst.len(), src.len())?;
        dst.as_mut_slice().copy_from_slice(src);
        Ok(())
    }

    fn copy_to_host(&self, src: &Storage) -> Result<Vec<f32>> {
        Ok(metal_storage(src)?.as_slice().to_vec())
    }

    fn activation_forward(&self, kind: ActivationKind, x: &Storage) -> Result<Storage> {
        kind.validate()?;
        let x = metal_storage(x)?;
        let y = self.new_storage(x.len())?;
        log::debug!("metal activation forward: mode={} n={}", kind.name(), x.len());
        self.dispatch(
            &self.forward,
            &[&*x.buffer, &*y.buffer],
            ActParams::new(kind, x.len())?,
        )?;
        Ok(Storage::Metal(y))
    }

    fn activation_backward(
        &self,
        kind: ActivationKind,
        x: &Storage,
        y: &Storage,
        dy: &Storage,
    ) -> Result<Storage> {
        kind.validate()?;
        let x = metal_storage(x)?;
        let y = metal_storage(y)?;
        let dy = metal_storage(dy)?;
        check_len(x.len(), y.len())?;
        check_len(x.len(), dy.len())?;
        let dx = self.new_storage(x.len())?;
        log::debug!("metal activation backward: mode={} n={}", kind.name(), x.len());
        self.dispatch(
            &self.backward,
            &[&*x.buffer, &*y.buffer, &*dy.buffer, &*dx.buffer],
            ActParams::new(kind, x.len())?,
        )?;
        Ok(Storage::Metal(dx))
    }
}
