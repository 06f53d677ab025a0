//! The result envelope and its release protocol.
//!
//! Every exported function returns an [`FfiResult`] by value. The host owns
//! the two string fields from that point on and gives them back through
//! [`umbra_free_result`] or [`umbra_release_result`].
//!
//! ```text
//! ┌─────────┬────────────┬────────────────┬─────────────┐
//! │ success │ error_code │ error_message  │ data        │
//! ├─────────┼────────────┼────────────────┼─────────────┤
//! │    1    │     0      │     NULL       │ JSON / NULL │
//! │    0    │   != 0     │   C string     │    NULL     │
//! └─────────┴────────────┴────────────────┴─────────────┘
//! ```

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::Error;

/// Code used when an error is constructed with the success code.
const FALLBACK_ERROR_CODE: i32 = 900;

/// Outcome of a boundary call.
///
/// Fields are public for the C layout only; Rust code goes through the
/// constructors and accessors so the invariants in the table above hold.
#[repr(C)]
#[derive(Debug)]
pub struct FfiResult {
    /// 1 on success, 0 on failure
    pub success: i32,
    /// 0 on success
    pub error_code: i32,
    pub error_message: *mut c_char,
    pub data: *mut c_char,
}

impl FfiResult {
    /// Success carrying `data`.
    pub fn ok(data: impl Into<String>) -> Self {
        Self::success(Some(data.into()))
    }

    /// Success with no payload.
    pub fn ok_empty() -> Self {
        Self::success(None)
    }

    pub fn success(data: Option<String>) -> Self {
        Self {
            success: 1,
            error_code: 0,
            error_message: ptr::null_mut(),
            data: data.map_or(ptr::null_mut(), into_c_string),
        }
    }

    /// Failure. A `code` of 0 is replaced so it never reads as success.
    pub fn err(code: i32, message: impl Into<String>) -> Self {
        Self {
            success: 0,
            error_code: if code == 0 { FALLBACK_ERROR_CODE } else { code },
            error_message: into_c_string(message.into()),
            data: ptr::null_mut(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success != 0
    }

    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    pub fn data(&self) -> Option<&str> {
        // SAFETY: non-null fields always come from `into_c_string` and are
        // owned by this envelope.
        unsafe { borrow_c_str(self.data) }
    }

    pub fn error_message(&self) -> Option<&str> {
        // SAFETY: see `data`.
        unsafe { borrow_c_str(self.error_message) }
    }

    /// Consume the envelope into a Rust result.
    pub fn into_result(mut self) -> Result<Option<String>, (i32, String)> {
        let data = take_c_string(&mut self.data);
        let message = take_c_string(&mut self.error_message);
        if self.is_success() {
            Ok(data)
        } else {
            Err((self.error_code, message.unwrap_or_default()))
        }
    }

    /// Free both string fields and null them. Safe to repeat.
    fn release_fields(&mut self) {
        drop(take_c_string(&mut self.data));
        drop(take_c_string(&mut self.error_message));
    }
}

impl Drop for FfiResult {
    fn drop(&mut self) {
        self.release_fields();
    }
}

impl From<Error> for FfiResult {
    fn from(err: Error) -> Self {
        FfiResult::err(err.code(), err.to_string())
    }
}

impl From<crate::error::Result<Option<String>>> for FfiResult {
    fn from(result: crate::error::Result<Option<String>>) -> Self {
        match result {
            Ok(data) => FfiResult::success(data),
            Err(e) => e.into(),
        }
    }
}

/// Convert to an owned C string, dropping interior NUL bytes.
pub(crate) fn to_c_string(s: String) -> CString {
    CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        // no NULs remain
        CString::new(bytes).unwrap_or_default()
    })
}

fn into_c_string(s: String) -> *mut c_char {
    to_c_string(s).into_raw()
}

fn take_c_string(field: &mut *mut c_char) -> Option<String> {
    let raw = std::mem::replace(field, ptr::null_mut());
    if raw.is_null() {
        return None;
    }
    // SAFETY: produced by `CString::into_raw` and nulled above, so this is
    // the only reclaim.
    let owned = unsafe { CString::from_raw(raw) };
    Some(owned.to_string_lossy().into_owned())
}

unsafe fn borrow_c_str<'a>(raw: *const c_char) -> Option<&'a str> {
    if raw.is_null() {
        return None;
    }
    CStr::from_ptr(raw).to_str().ok()
}

/// Read a host-provided C string. Null means absent.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string valid for the call.
pub unsafe fn cstr_to_string(ptr: *const c_char) -> Result<Option<String>, Error> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|e| Error::InvalidArgument(format!("string is not UTF-8: {}", e)))
}

// ============================================================================
// RELEASE PROTOCOL
// ============================================================================

/// Release an envelope returned by any `umbra_*` function (by value).
#[no_mangle]
pub extern "C" fn umbra_free_result(result: FfiResult) {
    drop(result);
}

/// Release an envelope's strings in place and null them.
///
/// Repeated calls, a null pointer, or an already-empty envelope are no-ops.
///
/// # Safety
/// `result` must be null or point to an envelope returned by this library.
#[no_mangle]
pub unsafe extern "C" fn umbra_release_result(result: *mut FfiResult) {
    if let Some(result) = result.as_mut() {
        result.release_fields();
    }
}

/// Free a standalone string allocated by this library.
///
/// # Safety
/// `ptr` must be null or come from this library and not be freed yet.
#[no_mangle]
pub unsafe extern "C" fn umbra_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}
