//! Codec trait and the JSON implementation.
//!
//! Every frame on the wire is a single UTF-8 text frame holding one JSON
//! object. The [`Codec`] trait converts between Rust values and that text,
//! so the connection manager never calls `serde_json` directly.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values into text frames and decodes text frames back.
///
/// `Send + Sync + 'static` lets the codec live inside the long-running
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes one text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or does not
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use xyzzy_protocol::{Codec, HandshakeRequest, JsonCodec};
///
/// let codec = JsonCodec;
/// let text = codec.encode(&HandshakeRequest::new("1")).unwrap();
/// assert_eq!(text, r#"{"version":"1"}"#);
///
/// let decoded: HandshakeRequest = codec.decode(&text).unwrap();
/// assert_eq!(decoded.version, "1");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
