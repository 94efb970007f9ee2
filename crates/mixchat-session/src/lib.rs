//! Client-side session state for mixchat.
//!
//! Everything here is plain data owned by the connection task:
//!
//! 1. **Directory**: the last peer list and the caller's own identity
//!    ([`DirectoryCache`])
//! 2. **Recipient**: who outgoing messages go to, locked after the first
//!    send ([`RecipientSelection`])
//! 3. **Aliases**: local nicknames for peers, optionally kept in a JSON
//!    file ([`AliasBook`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection (above)  ← applies decoded responses and user intents here
//!     ↕
//! Session Layer (this crate)  ← directory, selection, aliases
//!     ↕
//! Protocol Layer (below)  ← provides PeerIdentity, Key
//! ```

mod alias;
mod directory;
mod error;
mod selection;

pub use alias::{Alias, AliasBook, NO_ALIAS, RESERVED_NAMES};
pub use directory::DirectoryCache;
pub use error::{AliasError, SessionError};
pub use selection::RecipientSelection;
