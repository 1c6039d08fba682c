use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::catalog::{Catalog, ChannelName};

pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// One record per unresolved catalog channel, keyed by canonical name in the
/// checkpoint file. Field names are part of the on-disk format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointEntry {
    pub name: ChannelName,
    pub pending_files: Vec<PathBuf>,
    pub processed: bool,
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint missing at {0}; initialize it before processing")]
    Missing(PathBuf),
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// An empty (or fully processed) store is the explicit `Exhausted` terminal
/// state; the driver reinitializes it from scratch.
#[derive(Debug)]
pub enum CheckpointState {
    Missing,
    Exhausted,
    Active(CheckpointStore),
}

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    entries: HashMap<String, CheckpointEntry>,
}

impl CheckpointStore {
    pub fn create(path: &Path, catalog: &Catalog, fetched_files: &[PathBuf]) -> Self {
        let mut entries = HashMap::new();
        for (_, name) in catalog.channels_in_order() {
            entries.insert(
                name.canonical().to_string(),
                CheckpointEntry {
                    name: name.clone(),
                    pending_files: fetched_files.to_vec(),
                    processed: false,
                },
            );
        }
        info!(
            "Initialized checkpoint with {} channels x {} files",
            entries.len(),
            fetched_files.len()
        );
        Self { path: path.to_path_buf(), entries }
    }

    pub fn load(path: &Path) -> Result<CheckpointState, CheckpointError> {
        if !path.exists() {
            return Ok(CheckpointState::Missing);
        }
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, CheckpointEntry> = serde_json::from_str(&raw)?;
        // Deletion and processed=true are interchangeable resolution markers;
        // a store with nothing left to do counts as exhausted either way.
        if entries.values().all(|e| e.processed) {
            return Ok(CheckpointState::Exhausted);
        }
        Ok(CheckpointState::Active(Self { path: path.to_path_buf(), entries }))
    }

    /// Like `load`, but an uninitialized checkpoint is an error.
    pub fn load_required(path: &Path) -> Result<Self, CheckpointError> {
        match Self::load(path)? {
            CheckpointState::Missing => Err(CheckpointError::Missing(path.to_path_buf())),
            CheckpointState::Exhausted => {
                Ok(Self { path: path.to_path_buf(), entries: HashMap::new() })
            }
            CheckpointState::Active(store) => Ok(store),
        }
    }

    pub fn save(&self) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        atomic_write(&self.path, json.as_bytes())?;
        Ok(())
    }

    pub fn get(&self, canonical: &str) -> Option<&CheckpointEntry> {
        self.entries.get(canonical).filter(|e| !e.processed)
    }

    pub fn remove(&mut self, canonical: &str) {
        self.entries.remove(canonical);
    }

    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|e| !e.processed).count()
    }

    /// Pending names in catalog-definition order; the JSON map itself does
    /// not preserve it.
    pub fn pending_in_order(&self, catalog: &Catalog) -> Vec<String> {
        catalog
            .channels_in_order()
            .map(|(_, name)| name.canonical())
            .filter(|canonical| self.get(canonical).is_some())
            .map(str::to_string)
            .collect()
    }
}

/// Replaces `path` via a temp file in the same directory, so an interrupted
/// save never leaves a half-written file behind.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file_mut().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
