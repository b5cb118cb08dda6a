//! FFI bindings for biotracks-flux
//!
//! This module provides C-compatible functions for hosts that own the radio
//! (Android, iOS) and hand raw sensor bytes to the decoder. All functions use
//! C strings (null-terminated) and return allocated memory that must be freed
//! by the caller using `biotracks_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;
use std::str::FromStr;

use uuid::Uuid;

use crate::config::{HrvConfig, SensorConfig};
use crate::error::ComputeError;
use crate::session::SensorSession;
use crate::stats::HrvSummary;
use crate::types::{TelemetryRecord, Vendor};

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

/// Borrow a byte buffer from the host; NULL is only allowed with length 0
unsafe fn bytes_from_raw<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if data.is_null() {
        return (len == 0).then_some(&[][..]);
    }
    Some(slice::from_raw_parts(data, len))
}

/// Parse an optional JSON config; NULL selects the defaults
unsafe fn optional_json<T>(
    ptr: *const c_char,
    parse: impl FnOnce(&str) -> Result<T, ComputeError>,
) -> Result<T, ComputeError>
where
    T: Default,
{
    match cstr_to_string(ptr) {
        Some(json) => parse(&json),
        None => Ok(T::default()),
    }
}

fn finish(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn records_to_json(records: &[TelemetryRecord]) -> Result<String, ComputeError> {
    Ok(serde_json::to_string(records)?)
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a SensorSession
pub struct BiotracksSessionHandle {
    session: SensorSession,
}

/// Create a session for one sensor connection.
///
/// # Safety
/// - `vendor` must be a valid null-terminated C string (`polar`, `zephyr`,
///   `neurosky`, `ble_hrm`, `ble_csc`).
/// - `config_json` may be NULL for the default `SensorConfig`.
/// - Must be freed with `biotracks_session_free`.
/// - Returns NULL on error; call `biotracks_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biotracks_session_new(
    vendor: *const c_char,
    config_json: *const c_char,
) -> *mut BiotracksSessionHandle {
    clear_last_error();

    let vendor_str = match cstr_to_string(vendor) {
        Some(s) => s,
        None => {
            set_last_error("Invalid vendor string pointer");
            return ptr::null_mut();
        }
    };

    let created = Vendor::from_str(&vendor_str).and_then(|vendor| {
        let config = optional_json(config_json, SensorConfig::from_json)?;
        Ok(SensorSession::new(vendor, config))
    });

    match created {
        Ok(session) => Box::into_raw(Box::new(BiotracksSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `biotracks_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn biotracks_session_free(session: *mut BiotracksSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Feed transport bytes and return the decoded records as a JSON array.
///
/// # Safety
/// - `session` must be a valid pointer returned by `biotracks_session_new`.
/// - `data` must point to `len` readable bytes (NULL allowed when `len` is 0).
/// - Returns a newly allocated string that must be freed with `biotracks_free_string`.
/// - Returns NULL on error; call `biotracks_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biotracks_session_feed(
    session: *mut BiotracksSessionHandle,
    data: *const u8,
    len: usize,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let bytes = match bytes_from_raw(data, len) {
        Some(b) => b,
        None => {
            set_last_error("Null data pointer");
            return ptr::null_mut();
        }
    };

    let records = handle.session.feed(bytes);
    finish(records_to_json(&records))
}

/// Route a BLE characteristic notification and return the record as JSON
/// (`null` when the payload produced no record).
///
/// # Safety
/// - `session` must be a valid pointer returned by `biotracks_session_new`.
/// - `service` and `characteristic` must be valid null-terminated UUID strings.
/// - `data` must point to `len` readable bytes.
/// - Returns a newly allocated string that must be freed with `biotracks_free_string`.
/// - Returns NULL on error; call `biotracks_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biotracks_session_characteristic(
    session: *mut BiotracksSessionHandle,
    service: *const c_char,
    characteristic: *const c_char,
    data: *const u8,
    len: usize,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let (service, characteristic) = match (cstr_to_string(service), cstr_to_string(characteristic)) {
        (Some(s), Some(c)) => (s, c),
        _ => {
            set_last_error("Invalid UUID string pointer");
            return ptr::null_mut();
        }
    };
    let (service, characteristic) = match (Uuid::parse_str(&service), Uuid::parse_str(&characteristic)) {
        (Ok(s), Ok(c)) => (s, c),
        _ => {
            set_last_error("Invalid UUID");
            return ptr::null_mut();
        }
    };
    let bytes = match bytes_from_raw(data, len) {
        Some(b) => b,
        None => {
            set_last_error("Null data pointer");
            return ptr::null_mut();
        }
    };

    finish(
        handle
            .session
            .on_characteristic(&service, &characteristic, bytes)
            .and_then(|record| Ok(serde_json::to_string(&record)?)),
    )
}

/// Latest published record as JSON (`null` before the first record).
///
/// # Safety
/// - `session` must be a valid pointer returned by `biotracks_session_new`.
/// - Returns a newly allocated string that must be freed with `biotracks_free_string`.
/// - Returns NULL on error; call `biotracks_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biotracks_session_latest(
    session: *const BiotracksSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*session;

    let latest = handle.session.latest();
    finish(serde_json::to_string(&latest.as_deref()).map_err(ComputeError::from))
}

/// HRV summary over the session's RR history, as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `biotracks_session_new`.
/// - `config_json` may be NULL for the default `HrvConfig`.
/// - Returns a newly allocated string that must be freed with `biotracks_free_string`.
/// - Returns NULL on error; call `biotracks_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biotracks_session_rr_summary(
    session: *const BiotracksSessionHandle,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*session;

    finish(
        optional_json(config_json, HrvConfig::from_json)
            .and_then(|config| handle.session.hrv_summary(&config).to_json()),
    )
}

/// Reset a session ahead of a reconnect.
///
/// # Safety
/// - `session` must be a valid pointer returned by `biotracks_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn biotracks_session_reset(session: *mut BiotracksSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    (*session).session.reset();
    0
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute an HRV summary from a JSON array of RR intervals (ms).
///
/// # Safety
/// - `rr_json` must be a valid null-terminated C string.
/// - `config_json` may be NULL for the default `HrvConfig`.
/// - Returns a newly allocated string that must be freed with `biotracks_free_string`.
/// - Returns NULL on error; call `biotracks_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biotracks_hrv_summary(
    rr_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let rr_str = match cstr_to_string(rr_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<Vec<f64>>(&rr_str)
        .map_err(ComputeError::from)
        .and_then(|rr| {
            let config = optional_json(config_json, HrvConfig::from_json)?;
            HrvSummary::compute(&rr, &config).to_json()
        });
    finish(result)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by biotracks functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a biotracks function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn biotracks_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next biotracks call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn biotracks_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn biotracks_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
