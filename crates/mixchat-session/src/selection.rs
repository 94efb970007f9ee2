//! Recipient selection: who outgoing messages go to.
//!
//! ```text
//!   Unselected ──choose()──→ Selected ──lock()──→ Locked
//!                              │  ↑
//!                              └──┘ choose() again
//! ```
//!
//! - **Unselected**: nothing chosen yet; sends are silently skipped.
//! - **Selected**: a peer from the directory is chosen and may still be
//!   replaced by another choice.
//! - **Locked**: a message was sent to the peer. The conversation partner is
//!   fixed for the rest of the connection.
//!
//! The selection stores the peer itself, not a directory index, so it stays
//! valid when the directory is refreshed.

use mixchat_protocol::PeerIdentity;

use crate::SessionError;

/// The state of the recipient choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecipientSelection {
    #[default]
    Unselected,
    Selected(PeerIdentity),
    Locked(PeerIdentity),
}

impl RecipientSelection {
    /// Chooses `peer` as the recipient.
    ///
    /// # Errors
    /// Returns [`SessionError::SelectionLocked`] once a message has been sent.
    pub fn choose(&mut self, peer: PeerIdentity) -> Result<(), SessionError> {
        match self {
            Self::Locked(current) => {
                tracing::debug!(
                    current = %current,
                    rejected = %peer,
                    "recipient change rejected, selection is locked"
                );
                Err(SessionError::SelectionLocked)
            }
            Self::Unselected | Self::Selected(_) => {
                tracing::debug!(recipient = %peer, "recipient selected");
                *self = Self::Selected(peer);
                Ok(())
            }
        }
    }

    /// Locks the current choice. Idempotent once locked.
    ///
    /// # Errors
    /// Returns [`SessionError::NoRecipient`] if nothing was chosen.
    pub fn lock(&mut self) -> Result<&PeerIdentity, SessionError> {
        *self = match std::mem::take(self) {
            Self::Unselected => return Err(SessionError::NoRecipient),
            Self::Selected(peer) => {
                tracing::info!(recipient = %peer, "recipient locked");
                Self::Locked(peer)
            }
            locked @ Self::Locked(_) => locked,
        };
        self.recipient().ok_or(SessionError::NoRecipient)
    }

    /// The active recipient, if one is chosen.
    pub fn recipient(&self) -> Option<&PeerIdentity> {
        match self {
            Self::Unselected => None,
            Self::Selected(peer) | Self::Locked(peer) => Some(peer),
        }
    }

    /// Returns `true` once the selection can no longer change.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}
