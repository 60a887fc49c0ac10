mod types;
mod error;
mod context;

pub use types::*;
pub use error::*;
pub use context::*;

use std::ffi::CString;
use std::os::raw::c_char;

use ar_layer::{Activation, Layer};

/// Execute a closure that returns an `ARStatus`, catching any panics
/// and converting them into `ARStatus::ErrorInternal`.
///
/// Handles hold trait-object backends, which are not `UnwindSafe`; a layer
/// that panicked mid-call must be destroyed by the caller.
fn catch_panic<F: FnOnce() -> ARStatus>(f: F) -> ARStatus {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            set_last_error("internal panic".to_string());
            ARStatus::ErrorInternal
        }
    }
}

/// Create an activation layer.
///
/// `backend` takes an `ARBackendType` value and `kind` an
/// `ARActivationKind` value; anything else is rejected and leaves
/// `*layer_out` untouched. `negative_slope` is only used by `LeakyRelu`. On
/// success, writes a heap-allocated handle into `*layer_out`; free it with
/// `ar_activation_destroy`.
#[no_mangle]
pub extern "C" fn ar_activation_create(
    backend: u32,
    kind: u32,
    negative_slope: f32,
    layer_out: *mut *mut ARActivation,
) -> ARStatus {
    catch_panic(|| {
        if layer_out.is_null() {
            set_last_error("layer_out is null".to_string());
            return ARStatus::ErrorInvalidArgument;
        }
        let backend = match ARBackendType::try_from(backend) {
            Ok(b) => b,
            Err(v) => {
                set_last_error(format!("unknown backend type {}", v));
                return ARStatus::ErrorInvalidArgument;
            }
        };
        let kind = match ARActivationKind::try_from(kind) {
            Ok(k) => k,
            Err(v) => {
                set_last_error(format!("unknown activation kind {}", v));
                return ARStatus::ErrorInvalidConfiguration;
            }
        };
        let layer = match Activation::with_kind(kind.to_kind(negative_slope)) {
            Ok(l) => l,
            Err(e) => return status_for(&e),
        };
        let handle = Box::new(ARActivation::new(backend, layer));
        log::debug!("ffi: created {:?} layer on {}", kind, handle.backend.name());
        unsafe {
            *layer_out = Box::into_raw(handle);
        }
        ARStatus::Ok
    })
}

/// Destroy a layer previously created by `ar_activation_create`.
///
/// Passing a null pointer is a no-op and returns `ARStatus::Ok`.
#[no_mangle]
pub unsafe extern "C" fn ar_activation_destroy(layer: *mut ARActivation) -> ARStatus {
    if layer.is_null() {
        return ARStatus::Ok;
    }
    drop(Box::from_raw(layer));
    ARStatus::Ok
}

/// Run a training forward pass over `n` floats at `x`, writing `n` floats
/// to the caller-allocated array `y`.
#[no_mangle]
pub unsafe extern "C" fn ar_activation_forward(
    layer: *mut ARActivation,
    x: *const f32,
    n: usize,
    y: *mut f32,
) -> ARStatus {
    catch_panic(|| {
        if layer.is_null() || x.is_null() || y.is_null() {
            set_last_error("null argument".to_string());
            return ARStatus::ErrorInvalidArgument;
        }
        let layer = unsafe { &mut *layer };
        let input = unsafe { std::slice::from_raw_parts(x, n) };
        match layer.forward(input) {
            Ok(out) => {
                unsafe { std::slice::from_raw_parts_mut(y, n) }.copy_from_slice(&out);
                ARStatus::Ok
            }
            Err(e) => status_for(&e),
        }
    })
}

/// Compute the input gradient for the last forward pass from `n` output
/// gradients at `dy`, writing `n` floats to the caller-allocated array `dx`.
#[no_mangle]
pub unsafe extern "C" fn ar_activation_backward(
    layer: *mut ARActivation,
    dy: *const f32,
    n: usize,
    dx: *mut f32,
) -> ARStatus {
    catch_panic(|| {
        if layer.is_null() || dy.is_null() || dx.is_null() {
            set_last_error("null argument".to_string());
            return ARStatus::ErrorInvalidArgument;
        }
        let layer = unsafe { &mut *layer };
        let grad = unsafe { std::slice::from_raw_parts(dy, n) };
        match layer.backward(grad) {
            Ok(out) => {
                unsafe { std::slice::from_raw_parts_mut(dx, n) }.copy_from_slice(&out);
                ARStatus::Ok
            }
            Err(e) => status_for(&e),
        }
    })
}

/// Drop the layer's cached forward pass.
#[no_mangle]
pub unsafe extern "C" fn ar_activation_reset(layer: *mut ARActivation) -> ARStatus {
    if layer.is_null() {
        return ARStatus::ErrorInvalidArgument;
    }
    let layer = &mut *layer;
    layer.layer.reset();
    ARStatus::Ok
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error, or
/// null if no error has occurred. The caller must free the returned string
/// with `ar_free_string`.
#[no_mangle]
pub extern "C" fn ar_last_error() -> *const c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `ar_last_error`.
#[no_mangle]
pub unsafe extern "C" fn ar_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
