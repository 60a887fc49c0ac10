use std::cell::RefCell;
use std::ffi::CString;

use ar_layer::LayerError;

use crate::types::ARStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `ar_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Record `err` as the last error and map it to a status code.
pub fn status_for(err: &LayerError) -> ARStatus {
    set_last_error(err.to_string());
    match err {
        LayerError::InvalidConfiguration(_) => ARStatus::ErrorInvalidConfiguration,
        LayerError::NotConfigured | LayerError::MissingForward => ARStatus::ErrorMissingForward,
        LayerError::LengthMismatch { .. } => ARStatus::ErrorLengthMismatch,
        LayerError::Tensor(ar_tensor::TensorError::LengthMismatch { .. }) => {
            ARStatus::ErrorLengthMismatch
        }
        LayerError::Tensor(_) => ARStatus::ErrorInternal,
    }
}
