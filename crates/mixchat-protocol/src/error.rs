//! Error types for the protocol layer.
//!
//! Every decode failure carries the raw input that caused it, so the
//! connection can surface it to the UI as a diagnostic and move on.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a request into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The input was not valid JSON, or not the expected JSON shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {source}")]
    Decode {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// The input was not valid base64 in any accepted alphabet.
    #[error("malformed base64: {raw:?}")]
    Base64 { raw: String },

    /// Decoded bytes were not UTF-8 text.
    #[error("decoded payload is not UTF-8: {raw:?}")]
    Utf8 { raw: String },
}

impl ProtocolError {
    /// The raw input that failed to decode, if this is a decode failure.
    pub fn raw(&self) -> Option<&str> {
        match self {
            #[cfg(feature = "json")]
            Self::Decode { raw, .. } => Some(raw),
            Self::Base64 { raw } | Self::Utf8 { raw } => Some(raw),
            _ => None,
        }
    }
}
