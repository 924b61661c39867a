//! Pending quote nominations, persisted so votes survive restarts.
//!
//! The store lives in a small TOML file next to the config. Every mutation
//! path in the gateway saves immediately; on commit the nomination is
//! removed, so replayed reaction events find nothing pending.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::quotes::Nomination;

/// Pending nominations, keyed by candidate message id (stringified for
/// TOML's string-keyed tables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingQuotes {
    #[serde(default)]
    pub nominations: HashMap<String, Nomination>,
}

impl PendingQuotes {
    /// Load the pending set from the default state file.
    pub fn load() -> Result<Self, PendingQuoteError> {
        Self::load_from(&Self::state_path()?)
    }

    /// Load from an explicit path (tests use a tempdir).
    pub fn load_from(path: &Path) -> Result<Self, PendingQuoteError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let pending: Self = toml::from_str(&content)?;
        if !pending.is_empty() {
            tracing::info!("Restored {} pending quote nominations", pending.len());
        }
        Ok(pending)
    }

    /// Save to the default state file.
    pub fn save(&self) -> Result<(), PendingQuoteError> {
        self.save_to(&Self::state_path()?)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), PendingQuoteError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn state_path() -> Result<PathBuf, PendingQuoteError> {
        let dirs = dirs::config_dir().ok_or(PendingQuoteError::NoConfigDir)?;
        Ok(dirs.join("paddock").join("pending_quotes.toml"))
    }

    /// Whether a nomination for this candidate message already exists.
    pub fn contains(&self, message_id: u64) -> bool {
        self.nominations.contains_key(&message_id.to_string())
    }

    pub fn insert(&mut self, nomination: Nomination) {
        self.nominations
            .insert(nomination.message_id.to_string(), nomination);
    }

    /// Find the nomination whose vote message carries the reactions.
    pub fn get_mut_by_vote_message(&mut self, vote_message_id: u64) -> Option<&mut Nomination> {
        self.nominations
            .values_mut()
            .find(|n| n.vote_message_id == vote_message_id)
    }

    pub fn remove(&mut self, message_id: u64) -> Option<Nomination> {
        self.nominations.remove(&message_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.nominations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nominations.is_empty()
    }
}

/// Pending quote store errors.
#[derive(Debug, thiserror::Error)]
pub enum PendingQuoteError {
    #[error("No config directory found")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nomination(message_id: u64, vote_message_id: u64) -> Nomination {
        Nomination::new(message_id, 100, 1, 2, vote_message_id)
    }

    #[test]
    fn insert_and_lookup() {
        let mut pending = PendingQuotes::default();
        pending.insert(nomination(11, 99));
        assert!(pending.contains(11));
        assert!(!pending.contains(12));
        assert!(pending.get_mut_by_vote_message(99).is_some());
        assert!(pending.get_mut_by_vote_message(98).is_none());
    }

    #[test]
    fn remove_empties_the_store() {
        let mut pending = PendingQuotes::default();
        pending.insert(nomination(11, 99));
        assert_eq!(pending.len(), 1);
        assert!(pending.remove(11).is_some());
        assert!(pending.is_empty());
        assert!(pending.remove(11).is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending_quotes.toml");

        let mut pending = PendingQuotes::default();
        let mut nom = nomination(11, 99);
        nom.nominator_approved = true;
        pending.insert(nom.clone());
        pending.save_to(&path).unwrap();

        let loaded = PendingQuotes::load_from(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.nominations.get("11"), Some(&nom));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PendingQuotes::load_from(&dir.path().join("nope.toml")).unwrap();
        assert!(loaded.is_empty());
    }
}
