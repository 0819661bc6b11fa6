//! # Callback Proxy
//!
//! Lets native-side code call back into the host synchronously. The host
//! registers one process-wide proxy function at startup; every callback is
//! then an `(handle, argsJSON) -> responseJSON` round trip through it. The
//! integer handle is chosen and owned by the host, it is not allocated by a
//! [`HandleTable`](crate::handles::HandleTable).
//!
//! Until a proxy is registered every invocation is a no-op that yields the
//! default result without an error.
//!
//! ```rust
//! use invoke_bridge::callback::{Callback, CallbackSlot};
//!
//! let slot = CallbackSlot::new();
//! let hash = Callback::new(5132);
//! assert_eq!(hash.call_via::<_, String>(&slot, &12).unwrap(), "");
//!
//! slot.set(|handle, args| Some(format!(r#""{handle}:{args}""#)));
//! assert_eq!(hash.call_via::<_, String>(&slot, &12).unwrap(), "5132:12");
//! ```

use crate::codec;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Host function receiving `(handle, argsJSON)`; `None` or `""` means no
/// response, an error means the host's answer was unusable
type FallibleProxyFn = dyn Fn(i32, &str) -> Result<Option<String>, CallbackError> + Send + Sync;

/// Errors returned to the domain operation that initiated a callback
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("failed to serialize callback arguments: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("callback returned nothing, but a response was expected of type: {expected}")]
    MissingResponse { expected: &'static str },

    #[error("expected empty response from callback, but got: {response}")]
    UnexpectedResponse { response: String },

    #[error("callback response is not valid UTF-8: {0}")]
    InvalidResponse(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

/// Function slot written once at startup and read by every callback
pub struct CallbackSlot {
    proxy: RwLock<Option<Arc<FallibleProxyFn>>>,
}

impl CallbackSlot {
    pub const fn new() -> Self {
        Self {
            proxy: parking_lot::const_rwlock(None),
        }
    }

    /// Register the proxy, replacing any previous registration
    pub fn set<F>(&self, proxy: F)
    where
        F: Fn(i32, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.set_fallible(move |handle, args| Ok(proxy(handle, args)));
    }

    /// Register a proxy whose responses may be rejected, e.g. bytes from a
    /// foreign host that are not UTF-8
    pub fn set_fallible<F>(&self, proxy: F)
    where
        F: Fn(i32, &str) -> Result<Option<String>, CallbackError> + Send + Sync + 'static,
    {
        *self.proxy.write() = Some(Arc::new(proxy));
    }

    /// Return to unregistered behaviour
    pub fn clear(&self) {
        *self.proxy.write() = None;
    }

    pub fn is_registered(&self) -> bool {
        self.proxy.read().is_some()
    }

    /// Raw round trip; `Ok(None)` when unregistered or when the host returned nothing
    pub fn invoke(&self, handle: i32, args: &str) -> Result<Option<String>, CallbackError> {
        match self.snapshot() {
            Some(proxy) => call_proxy(&*proxy, handle, args),
            None => Ok(None),
        }
    }

    /// The slot lock is released before the proxy runs, so the host may
    /// re-enter the bridge from inside the callback.
    fn snapshot(&self) -> Option<Arc<FallibleProxyFn>> {
        self.proxy.read().clone()
    }
}

impl Default for CallbackSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

fn call_proxy(
    proxy: &FallibleProxyFn,
    handle: i32,
    args: &str,
) -> Result<Option<String>, CallbackError> {
    Ok(proxy(handle, args)?.filter(|response| !response.is_empty()))
}

static GLOBAL_SLOT: CallbackSlot = CallbackSlot::new();

/// The process-wide callback slot
pub fn global() -> &'static CallbackSlot {
    &GLOBAL_SLOT
}

/// Register the process-wide proxy; call during initialization, before any
/// callback-dependent operation runs
pub fn set_callback_proxy<F>(proxy: F)
where
    F: Fn(i32, &str) -> Option<String> + Send + Sync + 'static,
{
    GLOBAL_SLOT.set(proxy);
}

/// Host-owned callback handle, transmitted as a plain JSON integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Callback(i32);

impl Callback {
    pub const fn new(handle: i32) -> Self {
        Self(handle)
    }

    pub const fn handle(self) -> i32 {
        self.0
    }

    /// Invoke through the global slot, expecting no response
    pub fn notify<A>(&self, args: &A) -> Result<(), CallbackError>
    where
        A: Serialize + ?Sized,
    {
        self.notify_via(global(), args)
    }

    /// Invoke through the global slot and decode the response into `T`
    pub fn call<A, T>(&self, args: &A) -> Result<T, CallbackError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.call_via(global(), args)
    }

    pub fn notify_via<A>(&self, slot: &CallbackSlot, args: &A) -> Result<(), CallbackError>
    where
        A: Serialize + ?Sized,
    {
        match self.round_trip(slot, args)? {
            RoundTrip::Unregistered | RoundTrip::Answered(None) => Ok(()),
            RoundTrip::Answered(Some(response)) => {
                Err(CallbackError::UnexpectedResponse { response })
            }
        }
    }

    pub fn call_via<A, T>(&self, slot: &CallbackSlot, args: &A) -> Result<T, CallbackError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        match self.round_trip(slot, args)? {
            RoundTrip::Unregistered => Ok(T::default()),
            RoundTrip::Answered(None) => Err(CallbackError::MissingResponse {
                expected: std::any::type_name::<T>(),
            }),
            RoundTrip::Answered(Some(response)) => Ok(codec::deserialize(&response)?),
        }
    }

    /// Serialize `args` and call the proxy registered when the call began
    fn round_trip<A>(&self, slot: &CallbackSlot, args: &A) -> Result<RoundTrip, CallbackError>
    where
        A: Serialize + ?Sized,
    {
        let Some(proxy) = slot.snapshot() else {
            return Ok(RoundTrip::Unregistered);
        };
        // not logged: this may be the logging callback itself
        let args = codec::serialize(args).map_err(CallbackError::Serialize)?;
        trace!(handle = self.0, "invoking host callback");
        call_proxy(&*proxy, self.0, &args).map(RoundTrip::Answered)
    }
}

enum RoundTrip {
    Unregistered,
    Answered(Option<String>),
}

impl From<i32> for Callback {
    fn from(handle: i32) -> Self {
        Self(handle)
    }
}
