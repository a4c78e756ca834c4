//! Session store adapters.
//!
//! `InMemorySessionStore` backs tests and the CLI; `JsonSessionStore` keeps
//! one pretty-printed JSON file per session under the sessions directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use studia_core::error::{Result, StudiaError};
use studia_core::session::{SessionStore, Transcript};
use tokio::sync::RwLock;

use crate::paths::StudiaPaths;

#[derive(Default)]
pub struct InMemorySessionStore {
    transcripts: RwLock<HashMap<String, Transcript>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn persist(&self, session_id: &str, transcript: &Transcript) -> Result<()> {
        let mut transcripts = self.transcripts.write().await;
        transcripts.insert(session_id.to_string(), transcript.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Transcript>> {
        let transcripts = self.transcripts.read().await;
        Ok(transcripts.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut transcripts = self.transcripts.write().await;
        transcripts.remove(session_id);
        Ok(())
    }
}

/// File-backed store: `<sessions_dir>/<session_id>.json`.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash never leaves a half-written transcript behind.
pub struct JsonSessionStore {
    root: PathBuf,
}

impl JsonSessionStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Store rooted at the default sessions directory.
    pub fn from_paths(paths: &StudiaPaths) -> Result<Self> {
        let root = paths
            .sessions_dir()
            .map_err(|e| StudiaError::config(e.to_string()))?;
        Ok(Self::new(root))
    }

    fn file_for(&self, session_id: &str) -> Result<PathBuf> {
        if session_id.is_empty()
            || session_id
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        {
            return Err(StudiaError::invalid_state(format!(
                "session id '{}' is not usable as a file name",
                session_id
            )));
        }
        Ok(self.root.join(format!("{}.json", session_id)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn persist(&self, session_id: &str, transcript: &Transcript) -> Result<()> {
        let path = self.file_for(session_id)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let json = serde_json::to_string_pretty(transcript)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(
            "[JsonSessionStore] Persisted {} turns for session {}",
            transcript.len(),
            session_id
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Transcript>> {
        let path = self.file_for(session_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.file_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
