//! Codec trait and the JSON implementation spoken by the relay.
//!
//! The [`Codec`] builds request envelopes and classifies inbound frames.
//! It is stateless: every method is a pure function of its arguments.

use crate::types::{ChatMessage, PeerIdentity, Request, ResponseKind};
use crate::ProtocolError;

/// Builds relay requests and classifies relay responses.
///
/// `Send + Sync + 'static` so a codec can live inside a spawned
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a request envelope into one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode_request(&self, request: &Request) -> Result<Vec<u8>, ProtocolError>;

    /// Classifies and decodes one inbound frame.
    ///
    /// # Errors
    /// Returns a decode error carrying the raw frame when it is not JSON,
    /// or when a recognized field has the wrong shape.
    fn decode_response(&self, data: &[u8]) -> Result<ResponseKind, ProtocolError>;

    /// Serializes a chat message and applies opaque base64 encoding.
    fn encode_message(&self, message: &ChatMessage) -> Result<String, ProtocolError>;

    /// Reverses [`encode_message`](Self::encode_message) for one fetched blob.
    fn decode_message(&self, blob: &str) -> Result<ChatMessage, ProtocolError>;

    /// `{"fetch":{}}`
    fn encode_fetch_request(&self) -> Result<Vec<u8>, ProtocolError> {
        self.encode_request(&Request::fetch())
    }

    /// `{"clients":{}}`
    fn encode_directory_request(&self) -> Result<Vec<u8>, ProtocolError> {
        self.encode_request(&Request::clients())
    }

    /// `{"details":{}}`
    fn encode_own_identity_request(&self) -> Result<Vec<u8>, ProtocolError> {
        self.encode_request(&Request::details())
    }

    /// `{"send":{"message":<base64>,"recipient":<peer>}}`
    fn encode_send_request(
        &self,
        payload: &ChatMessage,
        recipient: &PeerIdentity,
    ) -> Result<Vec<u8>, ProtocolError> {
        let message = self.encode_message(payload)?;
        self.encode_request(&Request::Send {
            message,
            recipient: recipient.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

#[cfg(feature = "json")]
mod json {
    use serde::Deserialize;
    use serde_json::Value;

    use super::Codec;
    use crate::opaque::{decode_opaque_blob, encode_opaque};
    use crate::types::{
        ChatMessage, PeerIdentity, Request, ResponseKind, DIRECTORY_FIELD,
        FETCH_FIELD, IDENTITY_FIELD, SEND_FIELD,
    };
    use crate::ProtocolError;

    #[derive(Deserialize)]
    struct FetchBody {
        // The relay sends `null` for an empty queue.
        #[serde(default)]
        messages: Option<Vec<Value>>,
    }

    #[derive(Deserialize)]
    struct DirectoryBody {
        #[serde(default)]
        clients: Option<Vec<PeerIdentity>>,
    }

    #[derive(Deserialize)]
    struct IdentityBody {
        details: PeerIdentity,
    }

    /// The relay's JSON text protocol.
    ///
    /// ```rust
    /// use mixchat_protocol::{Codec, JsonCodec, ResponseKind};
    ///
    /// let codec = JsonCodec;
    /// assert_eq!(codec.encode_fetch_request().unwrap(), br#"{"fetch":{}}"#);
    ///
    /// let kind = codec.decode_response(br#"{"send":{}}"#).unwrap();
    /// assert_eq!(kind, ResponseKind::SendAcknowledged);
    /// ```
    #[derive(Debug, Clone, Copy, Default)]
    pub struct JsonCodec;

    impl Codec for JsonCodec {
        fn encode_request(
            &self,
            request: &Request,
        ) -> Result<Vec<u8>, ProtocolError> {
            serde_json::to_vec(request).map_err(ProtocolError::Encode)
        }

        fn decode_response(
            &self,
            data: &[u8],
        ) -> Result<ResponseKind, ProtocolError> {
            let raw = || String::from_utf8_lossy(data).into_owned();

            let value: Value = serde_json::from_slice(data)
                .map_err(|source| ProtocolError::Decode { raw: raw(), source })?;

            let Value::Object(mut fields) = value else {
                return Ok(ResponseKind::Unrecognized(raw()));
            };

            // Priority order matters: a frame carrying several known fields
            // always classifies as the first one checked here.
            if let Some(body) = fields.remove(FETCH_FIELD) {
                let body: FetchBody = parse_body(body, raw)?;
                let blobs = body
                    .messages
                    .unwrap_or_default()
                    .into_iter()
                    .map(|entry| match entry {
                        Value::String(blob) => blob,
                        // Kept so the entry fails later on its own, without
                        // taking the rest of the batch down with it.
                        other => other.to_string(),
                    })
                    .collect();
                return Ok(ResponseKind::Fetched(blobs));
            }

            if let Some(body) = fields.remove(DIRECTORY_FIELD) {
                let body: DirectoryBody = parse_body(body, raw)?;
                let peers = body.clients.unwrap_or_default();
                // One bad entry rejects the snapshot: indices must match
                // what the relay listed.
                for peer in &peers {
                    peer.validate()?;
                }
                return Ok(ResponseKind::DirectoryUpdated(peers));
            }

            if let Some(body) = fields.remove(IDENTITY_FIELD) {
                let body: IdentityBody = parse_body(body, raw)?;
                return Ok(ResponseKind::OwnIdentity(
                    body.details.to_url_safe()?,
                ));
            }

            if fields.contains_key(SEND_FIELD) {
                return Ok(ResponseKind::SendAcknowledged);
            }

            Ok(ResponseKind::Unrecognized(raw()))
        }

        fn encode_message(
            &self,
            message: &ChatMessage,
        ) -> Result<String, ProtocolError> {
            let text =
                serde_json::to_string(message).map_err(ProtocolError::Encode)?;
            Ok(encode_opaque(&text))
        }

        fn decode_message(&self, blob: &str) -> Result<ChatMessage, ProtocolError> {
            let text = decode_opaque_blob(blob)?;
            serde_json::from_str(&text).map_err(|source| ProtocolError::Decode {
                raw: blob.to_owned(),
                source,
            })
        }
    }

    fn parse_body<T: serde::de::DeserializeOwned>(
        body: Value,
        raw: impl FnOnce() -> String,
    ) -> Result<T, ProtocolError> {
        serde_json::from_value(body)
            .map_err(|source| ProtocolError::Decode { raw: raw(), source })
    }
}

#[cfg(feature = "json")]
pub use json::JsonCodec;
