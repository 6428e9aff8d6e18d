//! Codec pipeline
//!
//! Bidirectional value ↔ bytes conversion with a declared content type.
//! Decode validates; encode does not, so a caller may legally encode data
//! whose decode later fails.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{decode_error, encode_error, validation_error, Result};

/// Structural validation: anything offering a fallible parse of a JSON value
///
/// Stands in for "has a `parse` method" schema objects. The serde-driven
/// [`SerdeSchema`] covers the common case; custom schemas add semantic
/// checks on top of shape.
pub trait Schema: Send + Sync {
    type Output;

    /// Parse and validate a decoded JSON value into the output type
    fn parse(&self, value: serde_json::Value) -> Result<Self::Output>;
}

/// Serde-driven schema: shape validation via `Deserialize`
pub struct SerdeSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Schema for SerdeSchema<T> {
    type Output = T;

    fn parse(&self, value: serde_json::Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| validation_error(e.to_string()))
    }
}

/// Bidirectional codec with a declared content type
pub trait Codec<T>: Send + Sync {
    /// MIME label for encoded payloads
    fn content_type(&self) -> &str;

    /// Encode a value to bytes
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes back to a value, validating along the way
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec with schema validation on decode
pub struct JsonCodec<S> {
    schema: S,
}

impl<S> JsonCodec<S> {
    pub fn new(schema: S) -> Self {
        Self { schema }
    }
}

impl<T: Serialize + DeserializeOwned> JsonCodec<SerdeSchema<T>> {
    /// JSON codec whose schema is the serde shape of `T`
    pub fn of() -> Self {
        Self::new(SerdeSchema::new())
    }
}

impl<S: Schema> Codec<S::Output> for JsonCodec<S>
where
    S::Output: Serialize,
{
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn encode(&self, value: &S::Output) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| encode_error(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<S::Output> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| decode_error(e.to_string()))?;
        self.schema.parse(value)
    }
}

/// UTF-8 pass-through codec
pub struct TextCodec;

impl Codec<String> for TextCodec {
    fn content_type(&self) -> &str {
        "text/plain"
    }

    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| decode_error(e.to_string()))
    }
}

/// Identity codec for raw binary payloads
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn content_type(&self) -> &str {
        "application/octet-stream"
    }

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}
