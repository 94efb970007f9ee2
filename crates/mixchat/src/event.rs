//! Events the engine emits to the UI adapter.

use mixchat_protocol::{IncomingMessage, OutgoingMessage, PeerIdentity};

/// Something the UI should know about.
///
/// Events arrive on the `mpsc` receiver handed out by
/// [`MixClient`](crate::MixClient) (or passed to
/// [`Connection::spawn`](crate::Connection::spawn)), in the order the
/// connection produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A fresh directory snapshot replaced the previous one. Indices chosen
    /// from an older snapshot may no longer point at the same peer.
    DirectoryUpdated(Vec<PeerIdentity>),

    /// The relay reported the caller's identity, already URL-safe.
    OwnIdentityKnown(PeerIdentity),

    /// A queued message was fetched and decoded.
    MessageReceived(IncomingMessage),

    /// A message left for `recipient`. Lets the UI echo the user's own line.
    MessageSent {
        message: OutgoingMessage,
        recipient: PeerIdentity,
    },

    /// The relay (or the network) ended the connection. Not emitted for
    /// closes the caller requested.
    ConnectionClosed { code: u16, reason: String },

    /// A frame or fetched blob could not be decoded and was dropped.
    DecodeWarning { raw: String, reason: String },

    /// The socket reported an error. The connection stays open.
    TransportError(String),
}
