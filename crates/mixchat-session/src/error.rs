//! Error types for the session layer.

/// Errors that can occur while choosing who to talk to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The index does not exist in the current directory snapshot.
    /// Legitimate when the directory refreshed after the UI chose it.
    #[error("no peer at index {index} (directory has {len} entries)")]
    NotFound { index: usize, len: usize },

    /// A message was already sent, so the recipient can no longer change.
    #[error("recipient is locked after the first send")]
    SelectionLocked,

    /// An operation needed a recipient but none was chosen.
    #[error("no recipient selected")]
    NoRecipient,
}

/// Errors from the alias book and its file.
#[derive(Debug, thiserror::Error)]
pub enum AliasError {
    #[error("alias name is empty")]
    EmptyName,

    #[error("{0:?} is reserved and cannot be used as an alias")]
    ReservedName(String),

    #[error("key is not base64: {0:?}")]
    InvalidKey(String),

    #[error("alias file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("alias file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}
