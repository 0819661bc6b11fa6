//! # Handle Table
//!
//! Opaque-handle registry for values that must never cross the boundary by
//! reference. The table exclusively owns every value it stores; the foreign
//! side only ever sees the integer key.
//!
//! ## Core Principle
//! - Handles are positive `i32` values, `0` is never issued
//! - Allocation walks a cursor from `1` up to the wrap bound and skips
//!   handles that are still in use
//! - `get` takes a shared lock, `add`/`remove` take an exclusive lock
//! - Removing a handle hands the value back to the caller, disposal is theirs
//!
//! ```rust
//! use invoke_bridge::handles::HandleTable;
//!
//! let table = HandleTable::new();
//! let handle = table.add("state".to_string());
//! assert_eq!(table.get(handle).unwrap(), "state");
//! assert_eq!(table.remove(handle).as_deref(), Some("state"));
//! assert!(table.get(handle).is_err());
//! ```

use crate::error::{BridgeError, BridgeResult};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::trace;

/// Highest handle issued before the cursor wraps back to `1`
pub const MAX_HANDLE: i32 = i32::MAX;

struct Slots<T> {
    used: HashMap<i32, T>,
    current: i32,
}

/// Thread-safe registry from positive integer handles to owned values
pub struct HandleTable<T> {
    slots: RwLock<Slots<T>>,
    max_handle: i32,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self::with_max_handle(MAX_HANDLE)
    }

    /// Create a table whose cursor wraps after `max_handle`.
    ///
    /// Values below `1` are clamped to `1`.
    pub fn with_max_handle(max_handle: i32) -> Self {
        Self {
            slots: RwLock::new(Slots {
                used: HashMap::new(),
                current: 0,
            }),
            max_handle: max_handle.max(1),
        }
    }

    /// Take ownership of `value` and return the handle that now refers to it.
    ///
    /// # Panics
    ///
    /// Panics when every handle up to the wrap bound is in use. This is an
    /// invariant violation of the process, not a recoverable request error.
    pub fn add(&self, value: T) -> i32 {
        let handle = {
            let mut slots = self.slots.write();
            if slots.used.len() >= self.max_handle as usize {
                drop(slots);
                let exhausted = BridgeError::ResourceExhausted {
                    type_name: std::any::type_name::<T>(),
                };
                panic!("{exhausted}");
            }
            loop {
                if slots.current >= self.max_handle {
                    slots.current = 0;
                }
                slots.current += 1;
                let candidate = slots.current;
                if let Entry::Vacant(entry) = slots.used.entry(candidate) {
                    entry.insert(value);
                    break candidate;
                }
            }
        };
        // log records may reach the host, which can read this table
        trace!(handle, "handle allocated");
        handle
    }

    /// Remove the entry for `handle`, returning ownership of the value.
    ///
    /// Removing an absent handle is a no-op.
    pub fn remove(&self, handle: i32) -> Option<T> {
        let removed = self.slots.write().used.remove(&handle);
        if removed.is_some() {
            trace!(handle, "handle released");
        }
        removed
    }

    pub fn contains(&self, handle: i32) -> bool {
        self.slots.read().used.contains_key(&handle)
    }

    /// Run `f` against the value behind `handle` while holding the read lock.
    ///
    /// Keep `f` short and never call back into the host from it.
    pub fn with<F, U>(&self, handle: i32, f: F) -> BridgeResult<U>
    where
        F: FnOnce(&T) -> U,
    {
        let slots = self.slots.read();
        slots
            .used
            .get(&handle)
            .map(f)
            .ok_or_else(|| BridgeError::invalid_handle(handle))
    }

    pub fn len(&self) -> usize {
        self.slots.read().used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> HandleTable<T> {
    /// Look up the value behind `handle`
    pub fn get(&self, handle: i32) -> BridgeResult<T> {
        self.with(handle, T::clone)
    }
}

impl<T: Clone + Default> HandleTable<T> {
    /// Lookup in `(error, value)` form: an absent handle yields an
    /// `InvalidHandle` error alongside `T::default()`.
    pub fn get_or_default(&self, handle: i32) -> (Option<BridgeError>, T) {
        match self.get(handle) {
            Ok(value) => (None, value),
            Err(err) => (Some(err), T::default()),
        }
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.read();
        f.debug_struct("HandleTable")
            .field("len", &slots.used.len())
            .field("current", &slots.current)
            .field("max_handle", &self.max_handle)
            .finish()
    }
}
