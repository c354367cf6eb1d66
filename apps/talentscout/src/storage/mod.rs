//! Profile storage: the sink completed sessions are handed to.
//!
//! The state machine calls `ProfileSink::submit` exactly once per completed
//! session. Failures are reported to operators; the candidate still sees a
//! completed conversation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::profile::models::CandidateProfile;
use crate::questions::generator::TechnologyReport;
use crate::questions::models::QuestionSpec;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Copy of a completed session handed to storage. Never a live reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub session_id: Uuid,
    pub profile: CandidateProfile,
    pub questions: Vec<QuestionSpec>,
    pub generation: Vec<TechnologyReport>,
}

#[async_trait]
pub trait ProfileSink: Send + Sync {
    async fn submit(&self, snapshot: &ProfileSnapshot) -> Result<(), StorageError>;
}

/// Appends one JSON document per line.
pub struct JsonlProfileStore {
    path: PathBuf,
}

impl JsonlProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ProfileSink for JsonlProfileStore {
    async fn submit(&self, snapshot: &ProfileSnapshot) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(snapshot)?;
        line.push(b'\n');

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(&line).await.map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        info!(
            "Stored profile for session {} in {}",
            snapshot.session_id,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ProfileSnapshot {
        let mut profile = CandidateProfile::default();
        profile.grant_consent();
        profile.set_full_name("Jane Doe".to_string()).unwrap();
        ProfileSnapshot {
            session_id: Uuid::new_v4(),
            profile,
            questions: vec![],
            generation: vec![],
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_submission() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("candidates.jsonl");
        let store = JsonlProfileStore::new(&path);

        let first = snapshot();
        let second = snapshot();
        store.submit(&first).await.unwrap();
        store.submit(&second).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let recovered: ProfileSnapshot = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(recovered.session_id, second.session_id);
        assert_eq!(recovered.profile.full_name(), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn test_unwritable_path_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let store = JsonlProfileStore::new(dir.path());
        let err = store.submit(&snapshot()).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
