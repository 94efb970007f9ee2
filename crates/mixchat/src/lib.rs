//! # mixchat
//!
//! Client-side protocol engine for chatting through a local mix-network
//! relay.
//!
//! The relay speaks a small polling protocol over one WebSocket: ask for
//! the peer directory, ask for your own identity, submit messages, and poll
//! for queued ones. This crate runs that protocol as a single actor task
//! and hands the UI a stream of [`Event`]s plus a [`ConnectionHandle`] for
//! intents.
//!
//! ## Layers
//!
//! ```text
//! UI adapter  ← events / intents →  mixchat (Connection actor, MixClient)
//!                                       ↕
//!                      mixchat-session (directory, recipient, aliases)
//!                      mixchat-poll (fetch cadence)
//!                                       ↕
//!                      mixchat-protocol (requests, response classification)
//!                                       ↕
//!                      mixchat-transport (WebSocket)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mixchat::prelude::*;
//!
//! # async fn demo() -> Result<(), MixchatError> {
//! let config = ClientConfig::builder().host("127.0.0.1").port(9000).build()?;
//! let (client, mut events) = MixClient::connect(config)?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         Event::MessageReceived(msg) => println!("{}", msg.content),
//!         Event::ConnectionClosed { code, reason } => {
//!             println!("closed: {code} {reason}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connection;
mod error;
mod event;

pub use client::MixClient;
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_PATH};
pub use connection::{Connection, ConnectionHandle, ConnectionState, SendOutcome};
pub use error::MixchatError;
pub use event::Event;

/// Everything a UI adapter usually needs.
pub mod prelude {
    pub use crate::{
        ClientConfig, Connection, ConnectionHandle, ConnectionState, Event,
        MixClient, MixchatError, SendOutcome,
    };
    pub use mixchat_protocol::{
        ChatMessage, IncomingMessage, Key, OutgoingMessage, PeerIdentity,
        ProviderIdentity,
    };
    pub use mixchat_session::{Alias, AliasBook, AliasError, SessionError};
    pub use mixchat_transport::{CloseInfo, WebSocketConnector};
}
