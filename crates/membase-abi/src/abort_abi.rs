//! ABI layer for `membase_abort`.

use std::ffi::{CStr, c_char};

use crate::backend_state::active_backend;

/// Message used when the caller passes null or text that is not UTF-8.
const DEFAULT_ABORT_MESSAGE: &str = "abort";

/// Reports `message` (a NUL-terminated string, or null) and terminates the
/// process.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn membase_abort(message: *const c_char) -> ! {
    let text = if message.is_null() {
        DEFAULT_ABORT_MESSAGE
    } else {
        // SAFETY: caller passes a valid NUL-terminated string.
        let bytes = unsafe { CStr::from_ptr(message) }.to_bytes();
        std::str::from_utf8(bytes).unwrap_or(DEFAULT_ABORT_MESSAGE)
    };
    active_backend().fatal_abort(text)
}
