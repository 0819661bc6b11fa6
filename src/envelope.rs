//! # Invocation Envelope
//!
//! Every dispatch outcome crosses the boundary as a two-field document:
//!
//! ```json
//! {"error": "", "result": 42}
//! ```
//!
//! `error` is empty exactly when the call succeeded. `result` is `null` for
//! shapes without a result and whenever the call failed.

use crate::codec;
use crate::error::BridgeResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error text for failures whose own message renders empty
pub const FALLBACK_ERROR: &str = "operation failed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub error: String,
    #[serde(default)]
    pub result: Value,
}

impl Envelope {
    pub fn success(result: Option<Value>) -> Self {
        Self {
            error: String::new(),
            result: result.unwrap_or(Value::Null),
        }
    }

    /// Envelope for a failed call; the error text is never empty
    pub fn failure(error: impl ToString) -> Self {
        let mut error = error.to_string();
        if error.trim().is_empty() {
            error = FALLBACK_ERROR.to_string();
        }
        Self {
            error,
            result: Value::Null,
        }
    }

    /// Normalize a dispatch outcome
    pub fn from_outcome(outcome: BridgeResult<Option<Value>>) -> Self {
        match outcome {
            Ok(result) => Self::success(result),
            Err(err) => Self::failure(err),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn to_json(&self) -> String {
        // a String and a serde_json::Value always serialize
        codec::serialize(self).unwrap_or_else(|err| {
            format!(
                r#"{{"error":{},"result":null}}"#,
                Value::String(err.to_string())
            )
        })
    }

    /// Strictly decode an envelope, rejecting any field besides `error` and `result`
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        codec::deserialize(input)
    }

    /// Decode the result into `T`, or return the error message on failure
    pub fn into_result<T>(self) -> Result<T, String>
    where
        T: serde::de::DeserializeOwned,
    {
        if self.is_error() {
            return Err(self.error);
        }
        serde_json::from_value(self.result).map_err(|e| e.to_string())
    }
}
