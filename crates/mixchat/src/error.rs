//! Unified error type for the mixchat engine.

use mixchat_poll::PollError;
use mixchat_protocol::ProtocolError;
use mixchat_session::SessionError;
use mixchat_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `mixchat` crate, you deal with this single error type
/// instead of importing errors from each layer. The `#[from]` attribute on
/// each variant generates the `From` impls, so `?` converts layer errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum MixchatError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, base64).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A poller error (double start, zero interval).
    #[error(transparent)]
    Poll(#[from] PollError),

    /// A session-level error (unknown index, locked recipient).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The caller broke the connection contract, e.g. sending while the
    /// connection is not open. A bug in the caller, not a runtime condition.
    #[error("protocol misuse: {0}")]
    ProtocolMisuse(String),

    /// The client configuration cannot produce a usable connection.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MixchatError {
    pub(crate) fn misuse(what: impl Into<String>) -> Self {
        Self::ProtocolMisuse(what.into())
    }
}
