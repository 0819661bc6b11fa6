//! # Bridge Error Types
//!
//! Error taxonomy for the invocation bridge. Request-level failures
//! (`MethodNotFound`, `InvalidArguments`, `InvocationError`, `InvalidHandle`)
//! are recoverable and travel back to the host inside the envelope. Errors
//! produced by a plugged-in operation are carried verbatim in
//! [`BridgeError::Domain`] so callers can compare them by type instead of by
//! message text.

use thiserror::Error;

/// Category of a [`BridgeError`], for matching without destructuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MethodNotFound,
    InvalidArguments,
    InvocationError,
    InvalidHandle,
    ResourceExhausted,
    Configuration,
    Domain,
}

/// Errors surfaced by the dispatcher, handle tables and configuration layer
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    #[error("invalid arguments: {method}: {message}")]
    InvalidArguments { method: String, message: String },

    /// The plugged-in operation does not conform to a supported shape
    #[error("invocation error: {method}: {message}")]
    InvocationError { method: String, message: String },

    #[error("invalid handle: {handle}")]
    InvalidHandle { handle: i32 },

    /// Never returned through an envelope: a saturated handle table aborts
    #[error("out of handles, unable to add {type_name}")]
    ResourceExhausted { type_name: &'static str },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Error returned by the invoked operation itself, passed through untouched
    #[error(transparent)]
    Domain(#[from] anyhow::Error),
}

impl BridgeError {
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    pub fn invalid_arguments(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn invocation_error(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvocationError {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn invalid_handle(handle: i32) -> Self {
        Self::InvalidHandle { handle }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap an error returned by a domain operation without altering it
    pub fn domain<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Domain(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::InvocationError { .. } => ErrorKind::InvocationError,
            Self::InvalidHandle { .. } => ErrorKind::InvalidHandle,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Domain(_) => ErrorKind::Domain,
        }
    }

    /// The pass-through domain error, if this is one.
    ///
    /// Use `is::<E>()` or `downcast_ref::<E>()` on the result to compare
    /// against a sentinel error type.
    pub fn domain_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this is a pass-through domain error of concrete type `E`
    pub fn is_domain<E>(&self) -> bool
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.domain_error().is_some_and(|err| err.is::<E>())
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
