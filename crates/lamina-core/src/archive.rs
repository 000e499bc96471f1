//! Append-only store of analysed points, keyed by serial index.
//!
//! Points of a parallel sweep finish in any order; the archive restores the
//! sweep order by key, both in memory and when read back from disk.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::types::PointResult;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive already holds a result with index {0}")]
    Duplicate(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive key '{0}' is not a serial index")]
    BadKey(String),
}

/// Ordered collection of [`PointResult`]s.
#[derive(Debug, Clone, Default)]
pub struct ResultArchive {
    entries: BTreeMap<usize, PointResult>,
}

impl ResultArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result under its own serial index. Existing entries are never
    /// replaced.
    pub fn append(&mut self, result: PointResult) -> Result<(), ArchiveError> {
        let index = result.index;
        if self.entries.contains_key(&index) {
            return Err(ArchiveError::Duplicate(index));
        }
        self.entries.insert(index, result);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&PointResult> {
        self.entries.get(&index)
    }

    /// Results in increasing serial index.
    pub fn iter(&self) -> impl Iterator<Item = &PointResult> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ArchiveError> {
        let keyed: BTreeMap<String, &PointResult> = self
            .entries
            .iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Ok(serde_json::to_string_pretty(&keyed)?)
    }

    /// Parse an archive written by [`ResultArchive::to_json`]. Keys are
    /// compared numerically, so `"10"` sorts after `"2"`.
    pub fn from_json(text: &str) -> Result<Self, ArchiveError> {
        let keyed: BTreeMap<String, PointResult> = serde_json::from_str(text)?;
        let mut archive = Self::new();
        for (key, mut result) in keyed {
            let index: usize = key.parse().map_err(|_| ArchiveError::BadKey(key.clone()))?;
            result.index = index;
            archive.append(result)?;
        }
        Ok(archive)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
