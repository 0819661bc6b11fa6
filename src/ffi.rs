//! C ABI boundary adapter
//!
//! Exposes the bridge to a foreign host through a narrow string-in/string-out
//! contract:
//!
//! - `Invoke(method, args)` dispatches into the installed [`Invoker`] and
//!   returns an envelope document
//! - `SetCallbackProxy(fn)` registers the host function used for callbacks
//! - `SetupLogging(handle, level)` forwards log records to a host callback
//! - `CreateBuffer` / `FreeBuffer` manage every string crossing the boundary
//!
//! Memory rules:
//! - Strings returned by `Invoke` are owned by the host and must be released
//!   with `FreeBuffer`
//! - Strings returned by the host proxy must be allocated with `CreateBuffer`;
//!   the bridge frees them after copying
//! - Argument strings passed into the host proxy are only valid for the
//!   duration of the call

use crate::callback::{self, CallbackError};
use crate::dispatcher::Invoker;
use crate::envelope::Envelope;
use crate::error::BridgeError;
use crate::logging;
use libc::{c_char, c_int, c_void};
use parking_lot::RwLock;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Host callback proxy: `(handle, argsJSON) -> responseJSON | NULL`
pub type CallbackProxyFn = unsafe extern "C" fn(handle: c_int, args: *const c_char) -> *mut c_char;

static INVOKER: RwLock<Option<Arc<dyn Invoker>>> = parking_lot::const_rwlock(None);

/// Install the dispatcher reached through `Invoke`, replacing any previous one
pub fn install<I>(invoker: I)
where
    I: Invoker + 'static,
{
    *INVOKER.write() = Some(Arc::new(invoker));
    info!("dispatcher installed at the C boundary");
}

pub fn is_installed() -> bool {
    INVOKER.read().is_some()
}

/// Dispatch through the installed invoker, as `Invoke` does
pub fn invoke(method: &str, args: &str) -> String {
    // clone out of the lock so operations may re-enter `Invoke`
    let invoker = INVOKER.read().clone();
    match invoker {
        Some(invoker) => invoker.invoke_json(method, args),
        None => Envelope::failure(BridgeError::method_not_found(method)).to_json(),
    }
}

/// Copy `text` into a zero-terminated buffer allocated with `calloc`
fn to_c_buffer(text: &str) -> *mut c_char {
    // SAFETY: the buffer is len + 1 bytes and zero-initialized, so the copy
    // stays in bounds and the result is terminated
    unsafe {
        let buffer = libc::calloc(text.len() + 1, 1) as *mut c_char;
        if !buffer.is_null() {
            ptr::copy_nonoverlapping(text.as_ptr(), buffer as *mut u8, text.len());
        }
        buffer
    }
}

/// Borrow a C string, `None` for NULL
unsafe fn read_c_str<'a>(ptr: *const c_char) -> Option<Result<&'a str, std::str::Utf8Error>> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_str())
    }
}

fn call_host(
    proxy: CallbackProxyFn,
    handle: i32,
    args: &str,
) -> Result<Option<String>, CallbackError> {
    // serialized JSON never contains interior NUL bytes
    let Ok(args) = CString::new(args) else {
        return Ok(None);
    };
    // SAFETY: `args` outlives the call; a non-null response is a
    // zero-terminated buffer from `CreateBuffer` that we now own
    unsafe {
        let response = proxy(handle, args.as_ptr());
        if response.is_null() {
            return Ok(None);
        }
        let text = CStr::from_ptr(response).to_str().map(str::to_owned);
        libc::free(response as *mut c_void);
        Ok(Some(text?))
    }
}

/// Invoke a named operation
///
/// # Arguments
/// * `method` - Null-terminated operation name
/// * `args` - Null-terminated JSON argument, or NULL for no argument
///
/// # Returns
/// * Envelope JSON `{"error": "...", "result": ...}`, release with `FreeBuffer()`
/// * NULL only if the result buffer could not be allocated
///
/// # Safety
/// `method` and `args` must each be NULL or a valid null-terminated string
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn Invoke(method: *const c_char, args: *const c_char) -> *mut c_char {
    let method = match read_c_str(method) {
        Some(Ok(method)) => method,
        _ => {
            let err = BridgeError::invalid_arguments("", "method name must be a valid UTF-8 string");
            return to_c_buffer(&Envelope::failure(err).to_json());
        }
    };
    let args = match read_c_str(args) {
        None => "",
        Some(Ok(args)) => args,
        Some(Err(err)) => {
            let err = BridgeError::invalid_arguments(method, err.to_string());
            return to_c_buffer(&Envelope::failure(err).to_json());
        }
    };
    to_c_buffer(&invoke(method, args))
}

/// Register the host callback proxy; NULL returns to unregistered behaviour
///
/// # Safety
/// `proxy` must stay callable for the rest of the process lifetime and must be
/// safe to call from any thread that enters the bridge
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn SetCallbackProxy(proxy: Option<CallbackProxyFn>) {
    match proxy {
        Some(proxy) => {
            callback::global().set_fallible(move |handle, args| call_host(proxy, handle, args));
            debug!("callback proxy registered");
        }
        None => {
            callback::global().clear();
            debug!("callback proxy cleared");
        }
    }
}

/// Forward log records at or above `level` to the host callback `handle`
///
/// # Safety
/// `level` must be NULL or a valid null-terminated string
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn SetupLogging(handle: c_int, level: *const c_char) {
    match read_c_str(level) {
        Some(Ok(level)) => {
            // failures are already logged
            let _ = logging::setup_logging(handle, level);
        }
        _ => error!(handle, "unable to parse log level"),
    }
}

/// Allocate a zero-initialized buffer of `size` bytes, NULL if `size` is negative
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn CreateBuffer(size: c_int) -> *mut c_void {
    match usize::try_from(size) {
        // SAFETY: calloc accepts any size and returns NULL on failure
        Ok(size) => unsafe { libc::calloc(size, 1) },
        Err(_) => ptr::null_mut(),
    }
}

/// Release a buffer returned by `Invoke` or `CreateBuffer`
///
/// # Safety
/// `ptr` must be NULL or a pointer obtained from this library that has not
/// been freed yet
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn FreeBuffer(ptr: *mut c_void) {
    libc::free(ptr);
}
