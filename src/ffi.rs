//! FFI bindings for W-HEART
//!
//! C-compatible entry points for calling the engine from other languages.
//! All functions take and return null-terminated C strings; returned memory
//! must be freed by the caller using `wheart_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::engine::{evaluate, evaluate_batch};
use crate::types::RiskInput;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Parse, range-check, and evaluate one JSON input
fn evaluate_json(json: &str) -> Result<String, String> {
    let input: RiskInput = serde_json::from_str(json).map_err(|e| format!("Invalid input JSON: {e}"))?;
    input.validate().map_err(|errors| errors.join("; "))?;
    serde_json::to_string(&evaluate(&input)).map_err(|e| e.to_string())
}

fn evaluate_json_array(json: &str) -> Result<String, String> {
    let inputs: Vec<RiskInput> =
        serde_json::from_str(json).map_err(|e| format!("Invalid input JSON: {e}"))?;
    for (index, input) in inputs.iter().enumerate() {
        input
            .validate()
            .map_err(|errors| format!("Input {index}: {}", errors.join("; ")))?;
    }
    serde_json::to_string(&evaluate_batch(&inputs)).map_err(|e| e.to_string())
}

fn run_with_json(json_ptr: *const c_char, f: fn(&str) -> Result<String, String>) -> *mut c_char {
    clear_last_error();

    // SAFETY: callers of the public entry points guarantee a valid C string
    let json = match unsafe { cstr_to_string(json_ptr) } {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match f(&json) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

/// Evaluate one JSON `RiskInput` and return the JSON `RiskOutput`.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `wheart_free_string`.
/// - Returns NULL on error; call `wheart_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wheart_evaluate(json: *const c_char) -> *mut c_char {
    run_with_json(json, evaluate_json)
}

/// Evaluate a JSON array of inputs and return a JSON array of outputs in order.
///
/// # Safety
/// Same contract as `wheart_evaluate`.
#[no_mangle]
pub unsafe extern "C" fn wheart_evaluate_batch(json: *const c_char) -> *mut c_char {
    run_with_json(json, evaluate_json_array)
}

/// Get the last error message for the current thread.
///
/// # Safety
/// The returned pointer is owned by the library and valid until the next call
/// on the same thread. Do not free it.
#[no_mangle]
pub unsafe extern "C" fn wheart_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Free a string returned by this library.
///
/// # Safety
/// `s` must be a pointer returned by a W-HEART function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn wheart_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Formula version string (static, do not free).
#[no_mangle]
pub extern "C" fn wheart_version() -> *const c_char {
    static VERSION: &[u8] = b"v1.6\0";
    VERSION.as_ptr() as *const c_char
}
