#![allow(clippy::doc_markdown)] // Allow technical terms like JSON, FFI in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Invoke Bridge
//!
//! Generic calling-convention layer between a managed host runtime and an
//! embedded native engine.
//!
//! ## Overview
//!
//! The host drives the engine through a single string-based entry point,
//! `Invoke(method, argsJSON) -> envelopeJSON`, and the engine calls back into
//! the host through one process-wide callback proxy. No domain logic lives
//! here: a domain crate registers its operations on a [`Dispatcher`] and
//! keeps its native objects in [`HandleTable`]s.
//!
//! ## Module Organization
//!
//! - [`handles`] - Opaque-handle registry for native-only values
//! - [`codec`] - Strict JSON serialization helpers
//! - [`envelope`] - The `{error, result}` document wrapping every outcome
//! - [`dispatcher`] - Name-based routing over the eight supported call shapes
//! - [`callback`] - Process-wide callback slot and the typed `Callback` handle
//! - [`logging`] - `tracing` layer that forwards log records to the host
//! - [`config`] - Configuration loading
//! - [`error`] - Structured error handling
//! - [`ffi`] - C ABI exports (`Invoke`, `SetCallbackProxy`, ...)
//!
//! ## Quick Start
//!
//! ```rust
//! use invoke_bridge::{HandleTable, OperationSet};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! #[serde(deny_unknown_fields)]
//! struct OpenParams {
//!     path: String,
//! }
//!
//! #[derive(Deserialize)]
//! #[serde(deny_unknown_fields)]
//! struct HandleParams {
//!     handle: i32,
//! }
//!
//! #[derive(Default)]
//! struct Service {
//!     databases: HandleTable<String>,
//! }
//!
//! let dispatcher = OperationSet::new()
//!     .value_with("DatabaseOpen", |s: &Service, p: OpenParams| s.databases.add(p.path))
//!     .fallible_unit_with("DatabaseClose", |s: &Service, p: HandleParams| {
//!         s.databases.remove(p.handle).map(|_| ()).ok_or_else(|| anyhow::anyhow!("not open"))
//!     })
//!     .build(Service::default());
//!
//! let opened = dispatcher.invoke_json("DatabaseOpen", r#"{"path":"/tmp/db"}"#);
//! assert_eq!(opened, r#"{"error":"","result":1}"#);
//! let closed = dispatcher.invoke_json("DatabaseClose", r#"{"handle":1}"#);
//! assert_eq!(closed, r#"{"error":"","result":null}"#);
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod callback;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod ffi;
pub mod handles;
pub mod logging;

pub use callback::{set_callback_proxy, Callback, CallbackError, CallbackSlot};
pub use config::BridgeConfig;
pub use dispatcher::{Arity, Dispatcher, Invoker, OperationSet, Returns, Shape, Signature, Slot};
pub use envelope::Envelope;
pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use handles::HandleTable;
