use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Persisted `file_path -> hex digest` map, stored as a flat JSON object.
///
/// The manifest is advisory: an unreadable file loads as empty, which simply makes every
/// file look new to the next update.
#[derive(Debug, Clone)]
pub struct HashManifest {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl HashManifest {
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!(
                        "Ignoring unreadable hash manifest {}: {e}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read hash manifest {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    /// Write atomically (temp file + rename)
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn get(&self, file_path: &str) -> Option<&str> {
        self.entries.get(file_path).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, file_path: &str) -> bool {
        self.entries.contains_key(file_path)
    }

    pub fn insert(&mut self, file_path: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(file_path.into(), digest.into());
    }

    pub fn remove(&mut self, file_path: &str) -> bool {
        self.entries.remove(file_path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
