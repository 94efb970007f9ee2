//! Wire protocol between the mixchat engine and the local relay.
//!
//! - **Types** ([`PeerIdentity`], [`ChatMessage`], [`Request`],
//!   [`ResponseKind`]): what travels on the socket.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): building requests and
//!   classifying the untagged responses.
//! - **Opaque encoding** ([`encode_opaque`], [`decode_opaque_blob`]): the
//!   base64 layer around chat payloads.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (ResponseKind) → Connection (events)
//! ```
//!
//! The protocol layer knows nothing about sockets or connection state.

mod codec;
mod error;
mod opaque;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use opaque::{decode_opaque_blob, encode_opaque};
pub use types::{
    ChatMessage, IncomingMessage, Key, OutgoingMessage, PeerIdentity,
    ProviderIdentity, Request, ResponseKind, DIRECTORY_FIELD, FETCH_FIELD,
    IDENTITY_FIELD, SEND_FIELD,
};
