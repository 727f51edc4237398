//! JSON-backed address book: named lists of normalized phone numbers.
//!
//! The whole book is persisted as a single document of shape
//! `{ "phoneLists": { name: ["50499998888", ...] } }` and rewritten in full
//! after every mutating operation. Writes go to a temporary file that is then
//! renamed over the target, so a crash mid-write never leaves a truncated
//! book behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted file shape.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BookFile {
    #[serde(rename = "phoneLists", default)]
    phone_lists: BTreeMap<String, Vec<String>>,
}

/// Result of an add operation: how many numbers were appended and how many
/// were skipped as exact duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    pub skipped: usize,
}

/// Named phone lists backed by a JSON file.
///
/// Owns the mapping for the process lifetime; callers pass phones that are
/// already normalized (see [`crate::phone::normalize`]).
#[derive(Debug)]
pub struct AddressBook {
    lists: BTreeMap<String, Vec<String>>,
    path: PathBuf,
}

impl AddressBook {
    /// Load the book from `path`. A missing file yields an empty book;
    /// unreadable or malformed JSON is an error (fatal to startup).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lists = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file: BookFile = serde_json::from_str(&contents)
                .with_context(|| format!("malformed phone book at {}", path.display()))?;
            file.phone_lists
        } else {
            debug!("no phone book at {}, starting empty", path.display());
            BTreeMap::new()
        };
        Ok(Self { lists, path })
    }

    /// Serialize the full book and atomically replace the backing file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = BookFile {
            phone_lists: self.lists.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Append `phones` to list `name`, creating the list if absent. Numbers
    /// already present (exact string match) are skipped. Persists on return.
    pub fn add(&mut self, name: &str, phones: &[String]) -> Result<AddOutcome> {
        let list = self.lists.entry(name.to_string()).or_default();
        let mut outcome = AddOutcome {
            added: 0,
            skipped: 0,
        };
        for phone in phones {
            if list.contains(phone) {
                outcome.skipped += 1;
            } else {
                list.push(phone.clone());
                outcome.added += 1;
            }
        }
        self.save()?;
        Ok(outcome)
    }

    /// Remove the first matching occurrence of each phone from list `name`.
    /// Returns `None` when the list does not exist. Persists on return.
    pub fn remove(&mut self, name: &str, phones: &[String]) -> Result<Option<usize>> {
        let Some(list) = self.lists.get_mut(name) else {
            return Ok(None);
        };
        let mut removed = 0;
        for phone in phones {
            if let Some(pos) = list.iter().position(|p| p == phone) {
                list.remove(pos);
                removed += 1;
            }
        }
        self.save()?;
        Ok(Some(removed))
    }

    /// Delete list `name` entirely. Returns whether it existed. Persists on
    /// return.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let existed = self.lists.remove(name).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }

    /// Phones in list `name`, in insertion order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    /// All lists with their lengths.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.lists.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
