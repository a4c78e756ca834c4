//! Transcript persistence on turn finalization.

use std::sync::{Arc, Weak};

use studia_core::error::Result;
use studia_core::session::{SessionLane, SessionStore};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::engine::ConversationEngine;
use crate::stream::EngineEvent;

/// Writes an engine's transcript to a [`SessionStore`] whenever one of its
/// turns is finalized.
#[derive(Clone)]
pub struct TranscriptPersister {
    store: Arc<dyn SessionStore>,
}

impl TranscriptPersister {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Storage key for an engine: the session id for the main lane, a
    /// suffixed id for the side-task lane.
    pub fn storage_key(engine: &ConversationEngine) -> String {
        match engine.lane() {
            SessionLane::Main => engine.session_id().to_string(),
            SessionLane::SideTask => format!("{}_side_task", engine.session_id()),
        }
    }

    pub async fn persist_now(&self, engine: &ConversationEngine) -> Result<()> {
        let key = Self::storage_key(engine);
        let transcript = engine.get_transcript();
        self.store.persist(&key, &transcript).await?;
        tracing::debug!(
            "[Persister] Saved {} turns for '{}'",
            transcript.len(),
            key
        );
        Ok(())
    }

    /// Spawns a task that persists after every finalized turn.
    ///
    /// The task holds the engine weakly and stops once the engine is gone.
    pub fn spawn(&self, engine: &Arc<ConversationEngine>) -> JoinHandle<()> {
        let mut events = engine.subscribe_events();
        let engine: Weak<ConversationEngine> = Arc::downgrade(engine);
        let persister = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(EngineEvent::TurnFinalized { .. }) => {
                        let Some(engine) = engine.upgrade() else {
                            break;
                        };
                        if let Err(e) = persister.persist_now(&engine).await {
                            tracing::error!(
                                "[Persister] Failed to save '{}': {}",
                                Self::storage_key(&engine),
                                e
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("[Persister] Missed {} engine events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
