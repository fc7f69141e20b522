//! Codec trait and the JSON implementation.
//!
//! The server only ever talks to a [`Codec`], so the wire format can be
//! swapped without touching the handler.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Browser clients read these frames directly, so JSON is the only codec
/// the server ships with.
///
/// ```rust
/// use bankroll_protocol::{Codec, Envelope, JsonCodec, Payload, Reply};
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 250,
///     payload: Payload::Response { id: 7, body: Reply::ok() },
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientRequest, Envelope, Payload, ServerEvent};

    #[test]
    fn test_decode_heartbeat_request() {
        let codec = JsonCodec;
        let bytes = br#"{"seq":4,"payload":{"type":"Request","data":{"id":1,"body":{"type":"heartbeat","clientTime":99}}}}"#;

        let env: Envelope = codec.decode(bytes).unwrap();

        assert_eq!(env.seq, 4);
        assert_eq!(
            env.payload,
            Payload::Request { id: 1, body: ClientRequest::Heartbeat { client_time: 99 } }
        );
    }

    #[test]
    fn test_encode_event_is_utf8_json() {
        let codec = JsonCodec;
        let env = Envelope {
            seq: 2,
            timestamp: 10,
            payload: Payload::Event(ServerEvent::ErrorMessage { text: "hi".into() }),
        };

        let bytes = codec.encode(&env).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();

        assert!(text.contains(r#""event":"error_message""#));
        assert!(text.contains(r#""type":"Event""#));
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"{nope");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
