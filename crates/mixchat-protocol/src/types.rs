//! Core protocol types for the relay wire format.
//!
//! These are the structures that travel over the socket between the engine
//! and the local relay, plus the [`ResponseKind`] the codec classifies every
//! inbound frame into.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::opaque;
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// A fixed-length binary key carried as base64 text.
///
/// The engine never interprets key bytes. It only cares about the alphabet:
/// keys shown to the user or used as lookup keys must be URL-safe base64,
/// and [`Key::to_url_safe`] is how values in the standard alphabet get there.
///
/// `#[serde(transparent)]` keeps the JSON form a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Wraps base64 text without validating it.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The base64 text as received.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Re-encodes this key into the padded URL-safe alphabet.
    ///
    /// Accepts standard or URL-safe input, padded or not. Values that are
    /// already URL-safe come back unchanged.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Base64`] if the text is not base64 at all.
    pub fn to_url_safe(&self) -> Result<Self, ProtocolError> {
        opaque::reencode_url_safe(&self.0).map(Self)
    }

    /// Checks that the text is base64 in either alphabet.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Base64`] if it is not.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        opaque::check(&self.0)
    }

    /// The first eight characters, for compact display.
    pub fn short(&self) -> &str {
        // Keys from the wire are unchecked until validated, so cut on a
        // char boundary.
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// The relay provider a peer is registered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub id: Key,
    pub host: String,
    /// The relay sends the port as a string (`"1789"`).
    pub port: String,
    #[serde(rename = "pubKey")]
    pub public_key: Key,
}

/// A reachable peer as listed in the directory.
///
/// Wire form:
///
/// ```json
/// { "id": "...", "pubKey": "...",
///   "provider": { "id": "...", "host": "...", "port": "...", "pubKey": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub id: Key,
    #[serde(rename = "pubKey")]
    pub public_key: Key,
    pub provider: ProviderIdentity,
}

impl PeerIdentity {
    /// Returns a copy with all four key-like fields in URL-safe form.
    ///
    /// The relay reports the caller's own identity in the standard alphabet;
    /// this must run on receipt before the identity is shown or compared.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Base64`] naming the first field that is not
    /// valid base64.
    pub fn to_url_safe(&self) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: self.id.to_url_safe()?,
            public_key: self.public_key.to_url_safe()?,
            provider: ProviderIdentity {
                id: self.provider.id.to_url_safe()?,
                host: self.provider.host.clone(),
                port: self.provider.port.clone(),
                public_key: self.provider.public_key.to_url_safe()?,
            },
        })
    }

    /// Checks that all four key-like fields are base64.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Base64`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.id.validate()?;
        self.public_key.validate()?;
        self.provider.id.validate()?;
        self.provider.public_key.validate()
    }

    /// One-line description used in directory listings.
    pub fn label(&self) -> String {
        format!(
            "{} @[Provider] {}",
            self.public_key, self.provider.public_key
        )
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}",
            self.public_key.short(),
            self.provider.host,
            self.provider.port
        )
    }
}

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

/// A chat message as exchanged between peers.
///
/// The relay treats this as opaque: it is serialized to JSON text, then
/// base64-encoded into the `message` field of a send request. Peers fetch it
/// back as a URL-safe base64 blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub content: String,
    pub sender_public_key: Key,
    pub sender_provider_public_key: Key,
}

/// A message this client is about to send.
pub type OutgoingMessage = ChatMessage;

/// A message fetched from the relay queue.
pub type IncomingMessage = ChatMessage;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A request envelope sent to the relay.
///
/// Serde's default externally tagged representation with lowercase names
/// produces exactly the relay's shapes, e.g. `{"fetch":{}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Request {
    /// Retrieve queued incoming messages.
    Fetch {},
    /// Retrieve the directory of reachable peers.
    Clients {},
    /// Retrieve the caller's own identity.
    Details {},
    /// Submit an opaque, base64-encoded message for `recipient`.
    Send {
        message: String,
        recipient: PeerIdentity,
    },
}

impl Request {
    pub fn fetch() -> Self {
        Self::Fetch {}
    }

    pub fn clients() -> Self {
        Self::Clients {}
    }

    pub fn details() -> Self {
        Self::Details {}
    }

    /// The envelope's field name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fetch {} => FETCH_FIELD,
            Self::Clients {} => DIRECTORY_FIELD,
            Self::Details {} => IDENTITY_FIELD,
            Self::Send { .. } => SEND_FIELD,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Top-level field names that identify a response, in classification order.
pub const FETCH_FIELD: &str = "fetch";
pub const DIRECTORY_FIELD: &str = "clients";
pub const IDENTITY_FIELD: &str = "details";
pub const SEND_FIELD: &str = "send";

/// What an inbound frame turned out to be.
///
/// Responses carry no type tag or correlation id, so the codec decides
/// by which top-level field is present, checking [`FETCH_FIELD`],
/// [`DIRECTORY_FIELD`], [`IDENTITY_FIELD`] then [`SEND_FIELD`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// Queued messages, still base64 blobs.
    Fetched(Vec<String>),
    /// A complete directory snapshot.
    DirectoryUpdated(Vec<PeerIdentity>),
    /// The caller's own identity, already re-encoded URL-safe.
    OwnIdentity(PeerIdentity),
    /// The relay accepted a send.
    SendAcknowledged,
    /// Valid JSON matching none of the known shapes.
    Unrecognized(String),
}

impl ResponseKind {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fetched(_) => "fetched",
            Self::DirectoryUpdated(_) => "directory",
            Self::OwnIdentity(_) => "own-identity",
            Self::SendAcknowledged => "send-ack",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_peer() -> PeerIdentity {
        PeerIdentity {
            id: Key::new("QQ=="),
            public_key: Key::new("Qg=="),
            provider: ProviderIdentity {
                id: Key::new("Qw=="),
                host: "3.8.176.11".into(),
                port: "1789".into(),
                public_key: Key::new("RA=="),
            },
        }
    }

    #[test]
    fn test_peer_identity_uses_wire_field_names() {
        let json = serde_json::to_value(sample_peer()).unwrap();
        assert_eq!(json["id"], "QQ==");
        assert_eq!(json["pubKey"], "Qg==");
        assert_eq!(json["provider"]["pubKey"], "RA==");
        assert_eq!(json["provider"]["port"], "1789");
        assert!(json.get("public_key").is_none());
    }

    #[test]
    fn test_peer_identity_round_trip() {
        let peer = sample_peer();
        let bytes = serde_json::to_vec(&peer).unwrap();
        let decoded: PeerIdentity = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(peer, decoded);
    }

    #[test]
    fn test_peer_identity_missing_provider_is_error() {
        let json = r#"{"id":"QQ==","pubKey":"Qg=="}"#;
        let result: Result<PeerIdentity, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_to_url_safe_rewrites_standard_alphabet() {
        // These are the two forms of the same key as the relay reports them.
        let mut peer = sample_peer();
        peer.public_key =
            Key::new("1I1XFLNq9fIP7gDcmJZNH6GtCk5r9+wb3Ay/fZa9fnI=");
        peer.provider.public_key =
            Key::new("XiVE6xA10xFkAwfIQuBDc/JRXWerL0Pcqi7DipEUeTE=");

        let safe = peer.to_url_safe().unwrap();
        assert_eq!(
            safe.public_key.as_str(),
            "1I1XFLNq9fIP7gDcmJZNH6GtCk5r9-wb3Ay_fZa9fnI="
        );
        assert_eq!(
            safe.provider.public_key.as_str(),
            "XiVE6xA10xFkAwfIQuBDc_JRXWerL0Pcqi7DipEUeTE="
        );
        assert_eq!(safe.provider.host, peer.provider.host);
    }

    #[test]
    fn test_to_url_safe_leaves_url_safe_keys_alone() {
        let key = Key::new("1I1XFLNq9fIP7gDcmJZNH6GtCk5r9-wb3Ay_fZa9fnI=");
        assert_eq!(key.to_url_safe().unwrap(), key);
    }

    #[test]
    fn test_to_url_safe_rejects_garbage() {
        let key = Key::new("not base64 at all!");
        assert!(matches!(
            key.to_url_safe(),
            Err(ProtocolError::Base64 { .. })
        ));
    }

    #[test]
    fn test_key_short_is_first_eight_chars() {
        let key = Key::new("eqjn-P2hFQpowbVPfAwtN3wDVfSKAhDrjgQvGyoa10Y=");
        assert_eq!(key.short(), "eqjn-P2h");
        assert_eq!(Key::new("abc").short(), "abc");
    }

    #[test]
    fn test_key_short_respects_char_boundaries() {
        assert_eq!(Key::new("aaaaaaaé").short(), "aaaaaaaé");
        assert_eq!(Key::new("éééééééééé").short(), "éééééééé");

        let mut peer = sample_peer();
        peer.public_key = Key::new("aaaaaaaébcd");
        assert_eq!(peer.to_string(), "aaaaaaaé@3.8.176.11:1789");
    }

    #[test]
    fn test_validate_flags_the_bad_field() {
        assert!(sample_peer().validate().is_ok());

        let mut peer = sample_peer();
        peer.provider.public_key = Key::new("aaaaaaaé");
        match peer.validate() {
            Err(ProtocolError::Base64 { raw }) => assert_eq!(raw, "aaaaaaaé"),
            other => panic!("expected a base64 error, got {other:?}"),
        }
    }

    #[test]
    fn test_label_names_both_keys() {
        let label = sample_peer().label();
        assert_eq!(label, "Qg== @[Provider] RA==");
    }

    #[test]
    fn test_chat_message_uses_camel_case() {
        let msg = ChatMessage {
            content: "hello".into(),
            sender_public_key: Key::new("a"),
            sender_provider_public_key: Key::new("b"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], "hello");
        assert_eq!(json["senderPublicKey"], "a");
        assert_eq!(json["senderProviderPublicKey"], "b");
    }

    // =====================================================================
    // Request wire shapes
    // =====================================================================

    #[test]
    fn test_constant_requests_serialize_to_empty_objects() {
        assert_eq!(
            serde_json::to_string(&Request::fetch()).unwrap(),
            r#"{"fetch":{}}"#
        );
        assert_eq!(
            serde_json::to_string(&Request::clients()).unwrap(),
            r#"{"clients":{}}"#
        );
        assert_eq!(
            serde_json::to_string(&Request::details()).unwrap(),
            r#"{"details":{}}"#
        );
    }

    #[test]
    fn test_send_request_shape() {
        let req = Request::Send {
            message: "aGk=".into(),
            recipient: sample_peer(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["send"]["message"], "aGk=");
        assert_eq!(json["send"]["recipient"]["pubKey"], "Qg==");
    }

    #[test]
    fn test_request_parses_back_from_wire() {
        // A relay (or a test double of one) reads requests back.
        let req: Request = serde_json::from_str(r#"{"details":{}}"#).unwrap();
        assert_eq!(req, Request::details());
    }
}
