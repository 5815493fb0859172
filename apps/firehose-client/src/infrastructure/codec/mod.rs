//! Stream Codec Module
//!
//! Decodes firehose payloads. Payloads are UTF-8 text carrying one JSON
//! document per frame; anything else is a decode error, which the client
//! logs and drops without touching the connection.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::application::ports::{CodecError, MessageDecoder};

/// A JSON object (key-value document).
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// JSON codec decoding each payload into `T`.
///
/// `T` defaults to `serde_json::Value`; use `JsonObject` to reject
/// non-object documents, or any `Deserialize` type for typed messages.
pub struct JsonCodec<T = serde_json::Value> {
    _message: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _message: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodec")
            .field("message", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> MessageDecoder for JsonCodec<T>
where
    T: DeserializeOwned + Send,
{
    type Message = T;

    fn decode(&self, payload: &[u8]) -> Result<T, CodecError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(text.trim())?)
    }
}
