//! The directory cache: the last-known peer list and the caller's identity.
//!
//! Both are filled asynchronously after the socket opens and thrown away
//! with the connection. Only decoded relay responses mutate the cache.
//!
//! # Concurrency note
//!
//! `DirectoryCache` is plain data with no locking. It is owned by the single
//! connection task, which applies one decoded response at a time; a directory
//! replacement is therefore atomic and the last one applied wins.

use mixchat_protocol::PeerIdentity;

/// Last-known directory snapshot plus the caller's own identity.
#[derive(Debug, Default, Clone)]
pub struct DirectoryCache {
    /// Replaced wholesale on every refresh. Indices into it are only
    /// meaningful for the snapshot they were taken from.
    peers: Vec<PeerIdentity>,

    /// Set by the first identity response, then immutable.
    own_identity: Option<PeerIdentity>,
}

impl DirectoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole directory. Never merges with the old snapshot.
    pub fn replace_directory(&mut self, peers: Vec<PeerIdentity>) {
        tracing::debug!(
            old = self.peers.len(),
            new = peers.len(),
            "directory replaced"
        );
        self.peers = peers;
    }

    /// Records the caller's identity.
    ///
    /// Returns `true` if this call set it. A second call is an anomaly (the
    /// identity cannot change within a connection) and is ignored.
    pub fn set_own_identity(&mut self, identity: PeerIdentity) -> bool {
        match &self.own_identity {
            None => {
                tracing::info!(identity = %identity, "own identity known");
                self.own_identity = Some(identity);
                true
            }
            Some(existing) => {
                if *existing != identity {
                    tracing::warn!(
                        current = %existing,
                        received = %identity,
                        "relay reported a different own identity; keeping the first"
                    );
                } else {
                    tracing::debug!("duplicate own identity response ignored");
                }
                false
            }
        }
    }

    /// The entry at `index` in the current snapshot, if any.
    pub fn resolve(&self, index: usize) -> Option<&PeerIdentity> {
        self.peers.get(index)
    }

    /// The current snapshot.
    pub fn directory(&self) -> &[PeerIdentity] {
        &self.peers
    }

    /// The caller's identity, once known.
    pub fn own_identity(&self) -> Option<&PeerIdentity> {
        self.own_identity.as_ref()
    }

    /// Number of peers in the current snapshot.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns `true` if the snapshot is empty (or not yet received).
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
