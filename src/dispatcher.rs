//! # Generic Method Dispatcher
//!
//! Routes `(method, argsJSON)` requests to operations registered on a fixed
//! receiver and normalizes every outcome into a uniform result.
//!
//! ## Supported Shapes
//!
//! | arity   | results                                   |
//! |---------|-------------------------------------------|
//! | 0-param | none, value, error, (error, value)        |
//! | 1-param | none, value, error, (error, value)        |
//!
//! Operations are registered through [`OperationSet`], which erases each one
//! into a decode-call-encode closure tagged with its [`Shape`]. Typed
//! registration methods can only produce valid shapes. Operation sets built
//! from a dynamic description use [`OperationSet::declare`] with a
//! [`Signature`]; a signature outside the supported shapes is detected once in
//! [`OperationSet::build`] and every call to it fails with `InvocationError`.
//!
//! ## Usage
//!
//! ```rust
//! use invoke_bridge::dispatcher::OperationSet;
//!
//! struct Library;
//!
//! let dispatcher = OperationSet::new()
//!     .value("Version", |_: &Library| "1.0")
//!     .value_with("Echo", |_: &Library, s: String| s)
//!     .build(Library);
//!
//! assert_eq!(dispatcher.invoke_json("Echo", r#""foo""#), r#"{"error":"","result":"foo"}"#);
//! assert!(dispatcher.invoke("Echo", "").is_err());
//! ```

use crate::codec;
use crate::envelope::Envelope;
use crate::error::{BridgeError, BridgeResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, trace, warn};

/// Result position in a declared signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Error,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Zero,
    One,
}

/// Result part of a supported shape; errors always come first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Returns {
    Nothing,
    Value,
    Error,
    ErrorValue,
}

impl Returns {
    pub fn has_error(self) -> bool {
        matches!(self, Self::Error | Self::ErrorValue)
    }

    pub fn has_value(self) -> bool {
        matches!(self, Self::Value | Self::ErrorValue)
    }
}

/// One of the eight supported (arity × result) combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub arity: Arity,
    pub returns: Returns,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arity = match self.arity {
            Arity::Zero => "0-param",
            Arity::One => "1-param",
        };
        let returns = match self.returns {
            Returns::Nothing => "no-result",
            Returns::Value => "one-result",
            Returns::Error => "error-only",
            Returns::ErrorValue => "(error,result)",
        };
        write!(f, "{arity}/{returns}")
    }
}

/// Declared parameter count and ordered result slots of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: usize,
    pub results: Vec<Slot>,
}

impl Signature {
    pub fn new(params: usize, results: &[Slot]) -> Self {
        Self {
            params,
            results: results.to_vec(),
        }
    }

    /// Validate against the supported shapes
    pub fn shape(&self) -> Result<Shape, String> {
        let arity = match self.params {
            0 => Arity::Zero,
            1 => Arity::One,
            n => return Err(format!("expected at most one parameter, declared {n}")),
        };
        let returns = match self.results.as_slice() {
            [] => Returns::Nothing,
            [Slot::Value] => Returns::Value,
            [Slot::Error] => Returns::Error,
            [Slot::Error, Slot::Value] => Returns::ErrorValue,
            [Slot::Value, Slot::Error] => {
                return Err("error must be the first result".to_string());
            }
            [Slot::Value, Slot::Value] => {
                return Err("at most one non-error result is supported".to_string());
            }
            other => return Err(format!("unsupported result slots: {other:?}")),
        };
        Ok(Shape { arity, returns })
    }
}

impl From<Shape> for Signature {
    fn from(shape: Shape) -> Self {
        let params = match shape.arity {
            Arity::Zero => 0,
            Arity::One => 1,
        };
        let results = match shape.returns {
            Returns::Nothing => vec![],
            Returns::Value => vec![Slot::Value],
            Returns::Error => vec![Slot::Error],
            Returns::ErrorValue => vec![Slot::Error, Slot::Value],
        };
        Self { params, results }
    }
}

enum CallFailure {
    Decode(serde_json::Error),
    Encode(serde_json::Error),
    Domain(anyhow::Error),
    Contract(String),
}

type Handler<R> = Box<dyn Fn(&R, Option<&str>) -> Result<Option<Value>, CallFailure> + Send + Sync>;

fn handler<R, F>(f: F) -> Handler<R>
where
    F: Fn(&R, Option<&str>) -> Result<Option<Value>, CallFailure> + Send + Sync + 'static,
{
    Box::new(f)
}

fn decode<P>(args: Option<&str>) -> Result<P, CallFailure>
where
    P: DeserializeOwned + 'static,
{
    codec::deserialize(args.unwrap_or_default()).map_err(CallFailure::Decode)
}

fn encode<O>(output: O) -> Result<Option<Value>, CallFailure>
where
    O: Serialize,
{
    serde_json::to_value(output)
        .map(Some)
        .map_err(CallFailure::Encode)
}

fn domain<E>(err: E) -> CallFailure
where
    E: Into<anyhow::Error>,
{
    CallFailure::Domain(err.into())
}

struct Operation<R> {
    shape: Result<Shape, String>,
    handler: Handler<R>,
}

/// Builder collecting named operations for a receiver of type `R`
pub struct OperationSet<R> {
    declared: Vec<(String, Signature, Handler<R>)>,
}

impl<R: 'static> OperationSet<R> {
    pub fn new() -> Self {
        Self {
            declared: Vec::new(),
        }
    }

    fn insert(mut self, name: &str, signature: Signature, handler: Handler<R>) -> Self {
        self.declared.push((name.to_string(), signature, handler));
        self
    }

    /// 0-param, no result
    pub fn unit<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R) + Send + Sync + 'static,
    {
        self.insert(
            name,
            Signature::new(0, &[]),
            handler(move |r, _| {
                f(r);
                Ok(None)
            }),
        )
    }

    /// 0-param, one result
    pub fn value<F, O>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R) -> O + Send + Sync + 'static,
        O: Serialize + 'static,
    {
        self.insert(
            name,
            Signature::new(0, &[Slot::Value]),
            handler(move |r, _| encode(f(r))),
        )
    }

    /// 0-param, error only
    pub fn fallible_unit<F, E>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R) -> Result<(), E> + Send + Sync + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.insert(
            name,
            Signature::new(0, &[Slot::Error]),
            handler(move |r, _| f(r).map(|()| None).map_err(domain)),
        )
    }

    /// 0-param, (error, result)
    pub fn fallible<F, O, E>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R) -> Result<O, E> + Send + Sync + 'static,
        O: Serialize + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.insert(
            name,
            Signature::new(0, &[Slot::Error, Slot::Value]),
            handler(move |r, _| f(r).map_err(domain).and_then(encode)),
        )
    }

    /// 1-param, no result
    pub fn unit_with<F, P>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R, P) + Send + Sync + 'static,
        P: DeserializeOwned + 'static,
    {
        self.insert(
            name,
            Signature::new(1, &[]),
            handler(move |r, args| {
                f(r, decode(args)?);
                Ok(None)
            }),
        )
    }

    /// 1-param, one result
    pub fn value_with<F, P, O>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R, P) -> O + Send + Sync + 'static,
        P: DeserializeOwned + 'static,
        O: Serialize + 'static,
    {
        self.insert(
            name,
            Signature::new(1, &[Slot::Value]),
            handler(move |r, args| encode(f(r, decode(args)?))),
        )
    }

    /// 1-param, error only
    pub fn fallible_unit_with<F, P, E>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R, P) -> Result<(), E> + Send + Sync + 'static,
        P: DeserializeOwned + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.insert(
            name,
            Signature::new(1, &[Slot::Error]),
            handler(move |r, args| f(r, decode(args)?).map(|()| None).map_err(domain)),
        )
    }

    /// 1-param, (error, result)
    pub fn fallible_with<F, P, O, E>(self, name: &str, f: F) -> Self
    where
        F: Fn(&R, P) -> Result<O, E> + Send + Sync + 'static,
        P: DeserializeOwned + 'static,
        O: Serialize + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.insert(
            name,
            Signature::new(1, &[Slot::Error, Slot::Value]),
            handler(move |r, args| f(r, decode(args)?).map_err(domain).and_then(encode)),
        )
    }

    /// Register an operation from a dynamic description.
    ///
    /// The handler receives the decoded argument (`None` for 0-param
    /// signatures). Returning an error from a signature without an error slot,
    /// or a value from one without a value slot, is reported as
    /// `InvocationError`.
    pub fn declare<F>(self, name: &str, signature: Signature, f: F) -> Self
    where
        F: Fn(&R, Option<Value>) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        let slots = signature.shape().ok().map(|shape| shape.returns);
        self.insert(
            name,
            signature,
            handler(move |r, args| {
                let arg = args.map(|a| decode::<Value>(Some(a))).transpose()?;
                let returns = slots.ok_or_else(|| CallFailure::Contract("malformed".into()))?;
                match f(r, arg) {
                    Err(err) if returns.has_error() => Err(CallFailure::Domain(err)),
                    Err(err) => Err(CallFailure::Contract(format!(
                        "operation without an error result failed: {err}"
                    ))),
                    Ok(Some(value)) if returns.has_value() => Ok(Some(value)),
                    Ok(None) if returns.has_value() => Ok(Some(Value::Null)),
                    Ok(Some(_)) => Err(CallFailure::Contract(
                        "operation without a result returned a value".to_string(),
                    )),
                    Ok(None) => Ok(None),
                }
            }),
        )
    }

    /// Validate every declared signature and bind the operations to `receiver`.
    ///
    /// Operations with an unsupported signature stay registered so that
    /// calling them reports `InvocationError` instead of `MethodNotFound`.
    pub fn build(self, receiver: R) -> Dispatcher<R> {
        let mut operations = HashMap::with_capacity(self.declared.len());
        for (name, signature, handler) in self.declared {
            let shape = signature.shape();
            if let Err(reason) = &shape {
                warn!(method = %name, reason = %reason, "operation does not conform to a supported shape");
            }
            if operations.insert(name.clone(), Operation { shape, handler }).is_some() {
                warn!(method = %name, "operation registered twice, keeping the last registration");
            }
        }
        info!(operations = operations.len(), "dispatcher ready");
        Dispatcher {
            receiver,
            operations,
        }
    }
}

impl<R: 'static> Default for OperationSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Name-based call router bound to a fixed receiver
pub struct Dispatcher<R> {
    receiver: R,
    operations: HashMap<String, Operation<R>>,
}

impl<R> Dispatcher<R> {
    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    /// Validated shape of `method`, `None` if no such operation exists
    pub fn shape(&self, method: &str) -> Option<Result<Shape, String>> {
        self.operations.get(method).map(|op| op.shape.clone())
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    /// Invoke `method` with `args`.
    ///
    /// An empty `args` string means "no argument" and is distinct from the
    /// JSON literal `null`. On success the value is `None` for shapes without
    /// a result.
    pub fn invoke(&self, method: &str, args: &str) -> BridgeResult<Option<Value>> {
        let Some(operation) = self.operations.get(method) else {
            debug!(method, "method not found");
            return Err(BridgeError::method_not_found(method));
        };
        let shape = operation
            .shape
            .as_ref()
            .map_err(|reason| BridgeError::invocation_error(method, reason.as_str()))?;

        let args = match (shape.arity, args.is_empty()) {
            (Arity::Zero, true) => None,
            (Arity::Zero, false) => {
                return Err(BridgeError::invalid_arguments(
                    method,
                    "operation takes no arguments",
                ));
            }
            (Arity::One, true) => {
                return Err(BridgeError::invalid_arguments(
                    method,
                    "operation requires an argument",
                ));
            }
            (Arity::One, false) => Some(args),
        };

        trace!(method, shape = %shape, "invoking operation");
        (operation.handler)(&self.receiver, args).map_err(|failure| match failure {
            CallFailure::Decode(err) => BridgeError::invalid_arguments(method, err.to_string()),
            CallFailure::Encode(err) => {
                BridgeError::invocation_error(method, format!("failed to encode result: {err}"))
            }
            CallFailure::Contract(reason) => BridgeError::invocation_error(method, reason),
            CallFailure::Domain(err) => BridgeError::Domain(err),
        })
    }

    /// Invoke `method` and render the outcome as an envelope document
    pub fn invoke_json(&self, method: &str, args: &str) -> String {
        let outcome = self.invoke(method, args);
        if let Err(err) = &outcome {
            debug!(method, error = %err, "invocation failed");
        }
        Envelope::from_outcome(outcome).to_json()
    }
}

/// Object-safe entry point used by the boundary adapter
pub trait Invoker: Send + Sync {
    fn invoke_json(&self, method: &str, args: &str) -> String;
}

impl<R: Send + Sync> Invoker for Dispatcher<R> {
    fn invoke_json(&self, method: &str, args: &str) -> String {
        Dispatcher::invoke_json(self, method, args)
    }
}
