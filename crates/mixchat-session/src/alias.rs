//! Local nicknames for peers.
//!
//! A peer is identified by the pair (public key, provider public key). The
//! book lives in memory and can be loaded from and saved to a JSON file so
//! names survive restarts.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use mixchat_protocol::{Key, PeerIdentity};
use serde::{Deserialize, Serialize};

use crate::AliasError;

/// Shown in place of a name for peers without an alias.
pub const NO_ALIAS: &str = "<none>";

/// Names that collide with the alias command's own vocabulary.
pub const RESERVED_NAMES: &[&str] = &[NO_ALIAS, "alias", "show", "remove", "add", "all"];

/// One named peer. Also the on-disk record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alias {
    pub name: String,
    pub public_key: Key,
    pub provider_public_key: Key,
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Alias: {} - Public Key: {} Provider's Public Key: {}",
            self.name, self.public_key, self.provider_public_key
        )
    }
}

/// Map from a peer's key pair to a user-chosen name.
#[derive(Debug, Default, Clone)]
pub struct AliasBook {
    names: HashMap<(Key, Key), String>,
}

impl AliasBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a book saved by [`save`](Self::save). A missing file is an
    /// empty book.
    ///
    /// # Errors
    /// - [`AliasError::Io`] if the file exists but cannot be read
    /// - [`AliasError::Format`] if it is not a list of aliases
    /// - any error [`assign`](Self::assign) reports for a stored entry
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AliasError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no alias file yet");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<Alias> = serde_json::from_str(&contents)?;
        let mut book = Self::new();
        for entry in entries {
            book.assign(entry.public_key, entry.provider_public_key, entry.name)?;
        }
        tracing::info!(path = %path.display(), count = book.len(), "aliases loaded");
        Ok(book)
    }

    /// Writes every alias to `path` as pretty JSON, creating parent
    /// directories as needed.
    ///
    /// # Errors
    /// Returns [`AliasError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AliasError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.all())?;
        fs::write(path, json)?;
        tracing::debug!(path = %path.display(), count = self.len(), "aliases saved");
        Ok(())
    }

    /// Names a peer, replacing any previous alias. Returns the old one.
    ///
    /// # Errors
    /// - [`AliasError::EmptyName`] for a blank name
    /// - [`AliasError::ReservedName`] for a name in [`RESERVED_NAMES`]
    /// - [`AliasError::InvalidKey`] if either key is not base64
    pub fn assign(
        &mut self,
        public_key: Key,
        provider_public_key: Key,
        name: impl Into<String>,
    ) -> Result<Option<String>, AliasError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AliasError::EmptyName);
        }
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(AliasError::ReservedName(name));
        }
        for key in [&public_key, &provider_public_key] {
            if key.validate().is_err() {
                return Err(AliasError::InvalidKey(key.as_str().to_owned()));
            }
        }

        tracing::debug!(peer = %public_key.short(), %name, "alias assigned");
        Ok(self.names.insert((public_key, provider_public_key), name))
    }

    /// Convenience for [`assign`](Self::assign) with a directory entry.
    pub fn assign_peer(
        &mut self,
        peer: &PeerIdentity,
        name: impl Into<String>,
    ) -> Result<Option<String>, AliasError> {
        self.assign(
            peer.public_key.clone(),
            peer.provider.public_key.clone(),
            name,
        )
    }

    pub fn remove(&mut self, public_key: &Key, provider_public_key: &Key) -> Option<String> {
        self.names
            .remove(&(public_key.clone(), provider_public_key.clone()))
    }

    /// Drops every alias. Returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.names.len();
        self.names.clear();
        count
    }

    pub fn get(&self, public_key: &Key, provider_public_key: &Key) -> Option<&str> {
        self.names
            .get(&(public_key.clone(), provider_public_key.clone()))
            .map(String::as_str)
    }

    /// The record for a key pair, named [`NO_ALIAS`] if it has none.
    pub fn entry(&self, public_key: &Key, provider_public_key: &Key) -> Alias {
        Alias {
            name: self
                .get(public_key, provider_public_key)
                .unwrap_or(NO_ALIAS)
                .to_owned(),
            public_key: public_key.clone(),
            provider_public_key: provider_public_key.clone(),
        }
    }

    /// The alias if one is set, otherwise `"??? - <first 8 chars>..."`.
    pub fn display_name(&self, public_key: &Key, provider_public_key: &Key) -> String {
        match self.get(public_key, provider_public_key) {
            Some(name) => name.to_owned(),
            None => format!("??? - {}...", public_key.short()),
        }
    }

    /// Every alias, ordered by name then keys.
    pub fn all(&self) -> Vec<Alias> {
        self.matching(|_| true)
    }

    /// Every peer carrying `name`. Names are not unique.
    pub fn find_by_name(&self, name: &str) -> Vec<Alias> {
        self.matching(|assigned| assigned == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn matching(&self, mut keep: impl FnMut(&str) -> bool) -> Vec<Alias> {
        let mut aliases: Vec<Alias> = self
            .names
            .iter()
            .filter(|(_, name)| keep(name))
            .map(|((public_key, provider_public_key), name)| Alias {
                name: name.clone(),
                public_key: public_key.clone(),
                provider_public_key: provider_public_key.clone(),
            })
            .collect();
        aliases.sort_by(|a, b| {
            (&a.name, a.public_key.as_str(), a.provider_public_key.as_str()).cmp(&(
                &b.name,
                b.public_key.as_str(),
                b.provider_public_key.as_str(),
            ))
        });
        aliases
    }
}
