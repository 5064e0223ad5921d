//! File-backed persistence of managed roles

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::role::RoleConfig;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Last-synced view of one managed role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub config: RoleConfig,
}

/// One JSON document per role path under a directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(id)))
    }

    pub async fn load(&self, id: &str) -> Result<Option<ResourceState>, StateError> {
        let path = self.file_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, state: &ResourceState) -> Result<(), StateError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.file_for(&state.id);
        let tmp_path = path.with_extension("tmp");
        let output = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&tmp_path, &output).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!(id = %state.id, file = %path.display(), "Saved role state");
        Ok(())
    }

    /// Drop the document for `id`; a missing document is not an error
    pub async fn remove(&self, id: &str) -> Result<(), StateError> {
        match tokio::fs::remove_file(self.file_for(id)).await {
            Ok(()) => {
                debug!(id = %id, "Removed role state");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Every stored document, ordered by id
    pub async fn list(&self) -> Result<Vec<ResourceState>, StateError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut states = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            states.push(serde_json::from_slice::<ResourceState>(&bytes)?);
        }
        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }
}
