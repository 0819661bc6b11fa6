//! # JSON Codec
//!
//! Serialization helpers shared by the dispatcher, the envelope and the
//! callback proxy. Inbound payloads are decoded strictly: parameter types opt
//! into unknown-field rejection with `#[serde(deny_unknown_fields)]`, and the
//! decoder itself rejects anything after the first JSON value apart from
//! whitespace.
//!
//! ```rust
//! use serde::Deserialize;
//! use invoke_bridge::codec::deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! #[serde(deny_unknown_fields)]
//! struct Params {
//!     foo: i32,
//! }
//!
//! assert_eq!(deserialize::<Params>(r#" {"foo":42} "#).unwrap().foo, 42);
//! assert!(deserialize::<Params>(r#"{"foo":42,"bar":1}"#).is_err());
//! assert!(deserialize::<Vec<i32>>("1,2,3").is_err());
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn serialize<T>(input: &T) -> serde_json::Result<String>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(input)
}

/// Decode exactly one JSON value from `input` into `T`
pub fn deserialize<T>(input: &str) -> serde_json::Result<T>
where
    T: DeserializeOwned,
{
    let mut de = serde_json::Deserializer::from_str(input);
    let value = T::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}
