//! Reading progress collaborator: `{fingerprint -> page}`
//!
//! The viewer owns no persistence medium. It reads and writes through
//! `ProgressStore`; two stores ship with the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait ProgressStore {
    fn get(&self, fingerprint: &str) -> Option<usize>;

    fn set(&mut self, fingerprint: &str, page: usize);
}

/// Keeps progress for the lifetime of the process
#[derive(Debug, Default, Clone)]
pub struct MemoryProgressStore {
    pages: HashMap<String, usize>,
}

impl MemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, fingerprint: &str) -> Option<usize> {
        self.pages.get(fingerprint).copied()
    }

    fn set(&mut self, fingerprint: &str, page: usize) {
        self.pages.insert(fingerprint.to_string(), page);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Progress {
    pub page: usize,
    pub last_read: chrono::DateTime<chrono::Utc>,
}

/// JSON file keyed by document fingerprint, saved on every update
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonProgressStore {
    documents: HashMap<String, Progress>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl JsonProgressStore {
    pub fn ephemeral() -> Self {
        Self {
            documents: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            documents: HashMap::new(),
            file_path: Some(file_path.into()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load progress from {}: {}", path.display(), e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)?;
            let mut store: Self = serde_json::from_str(&content)?;
            store.file_path = Some(file_path.to_path_buf());
            Ok(store)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn get_progress(&self, fingerprint: &str) -> Option<&Progress> {
        self.documents.get(fingerprint)
    }

    pub fn get_most_recent(&self) -> Option<(String, &Progress)> {
        self.documents
            .iter()
            .max_by_key(|(_, progress)| progress.last_read)
            .map(|(fingerprint, progress)| (fingerprint.clone(), progress))
    }
}

impl ProgressStore for JsonProgressStore {
    fn get(&self, fingerprint: &str) -> Option<usize> {
        self.documents.get(fingerprint).map(|p| p.page)
    }

    fn set(&mut self, fingerprint: &str, page: usize) {
        self.documents.insert(
            fingerprint.to_string(),
            Progress {
                page,
                last_read: chrono::Utc::now(),
            },
        );
        if self.file_path.is_some() {
            if let Err(e) = self.save() {
                log::error!("Failed to save progress: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_overwrites() {
        let mut store = MemoryProgressStore::new();
        assert_eq!(store.get("abc"), None);
        store.set("abc", 4);
        store.set("abc", 9);
        assert_eq!(store.get("abc"), Some(9));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn json_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut store = JsonProgressStore::load_or_ephemeral(Some(&path));
        store.set("f00d", 12);
        store.set("beef", 3);

        let reloaded = JsonProgressStore::load_from_file(&path).unwrap();
        assert_eq!(reloaded.get("f00d"), Some(12));
        assert_eq!(reloaded.get("beef"), Some(3));
        assert!(reloaded.get_most_recent().is_some());
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonProgressStore::load_or_ephemeral(Some(&path));
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn ephemeral_store_never_writes() {
        let mut store = JsonProgressStore::ephemeral();
        store.set("abc", 2);
        assert_eq!(store.get("abc"), Some(2));
        assert!(store.save().is_ok());
    }
}
