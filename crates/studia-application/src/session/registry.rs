use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use studia_core::config::EngineConfig;
use studia_core::error::Result;
use studia_core::session::{SessionLane, SessionScope, SessionStore};
use studia_core::stream::{EventBus, GenerationTrigger, TurnInputs};
use tokio::sync::RwLock;

use super::engine::ConversationEngine;
use crate::stream::ResyncDecision;

/// Identifies one engine: a session plus the lane it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub session_id: String,
    pub lane: SessionLane,
}

impl SessionKey {
    pub fn new(session_id: impl Into<String>, lane: SessionLane) -> Self {
        Self {
            session_id: session_id.into(),
            lane,
        }
    }

    pub fn main(session_id: impl Into<String>) -> Self {
        Self::new(session_id, SessionLane::Main)
    }

    pub fn side_task(session_id: impl Into<String>) -> Self {
        Self::new(session_id, SessionLane::SideTask)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.lane)
    }
}

/// In-memory registry of conversation engines.
///
/// Each session may have a main lane and a side-task lane; the two never
/// share subscriptions or transcript state.
pub struct SessionRegistry {
    bus: Arc<dyn EventBus>,
    trigger: Arc<dyn GenerationTrigger>,
    config: EngineConfig,
    engines: Arc<RwLock<HashMap<SessionKey, Arc<ConversationEngine>>>>,
}

impl SessionRegistry {
    pub fn new(
        bus: Arc<dyn EventBus>,
        trigger: Arc<dyn GenerationTrigger>,
        config: EngineConfig,
    ) -> Self {
        Self {
            bus,
            trigger,
            config,
            engines: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn get(&self, key: &SessionKey) -> Option<Arc<ConversationEngine>> {
        let engines = self.engines.read().await;
        engines.get(key).cloned()
    }

    /// Returns the engine for `key`, creating it on first use.
    ///
    /// `scope` only applies when the engine is created.
    pub async fn get_or_create(
        &self,
        key: SessionKey,
        scope: SessionScope,
    ) -> Arc<ConversationEngine> {
        if let Some(engine) = self.get(&key).await {
            return engine;
        }

        let mut engines = self.engines.write().await;
        engines
            .entry(key)
            .or_insert_with_key(|key| {
                tracing::debug!("[Registry] Creating engine for {}", key);
                Arc::new(ConversationEngine::new(
                    key.session_id.clone(),
                    scope,
                    key.lane,
                    self.bus.clone(),
                    self.trigger.clone(),
                    &self.config,
                ))
            })
            .clone()
    }

    /// Opens the main lane of a session and offers the persisted transcript
    /// to it.
    ///
    /// Returns the engine and the resync decision, or `None` when nothing
    /// was stored.
    pub async fn restore(
        &self,
        session_id: &str,
        scope: SessionScope,
        store: &dyn SessionStore,
    ) -> Result<(Arc<ConversationEngine>, Option<ResyncDecision>)> {
        let engine = self.get_or_create(SessionKey::main(session_id), scope).await;
        let decision = store
            .load(session_id)
            .await?
            .map(|transcript| engine.resync(transcript));
        Ok((engine, decision))
    }

    /// Runs a side task (e.g. a summary) for `session_id` in its own lane.
    ///
    /// Returns the side-task engine and the index of the generated turn.
    pub async fn start_side_task(
        &self,
        session_id: &str,
        scope: SessionScope,
        inputs: TurnInputs,
    ) -> Result<(Arc<ConversationEngine>, usize)> {
        let engine = self
            .get_or_create(SessionKey::side_task(session_id), scope)
            .await;
        let index = engine.start_turn(inputs).await?;
        Ok((engine, index))
    }

    /// Detaches and forgets one engine. Returns `false` if it was unknown.
    pub async fn remove(&self, key: &SessionKey) -> bool {
        let removed = self.engines.write().await.remove(key);
        match removed {
            Some(engine) => {
                engine.detach();
                tracing::debug!("[Registry] Removed engine for {}", key);
                true
            }
            None => false,
        }
    }

    /// Detaches and forgets both lanes of a session. Returns how many
    /// engines were removed.
    pub async fn close_session(&self, session_id: &str) -> usize {
        let mut removed = 0;
        for key in [SessionKey::main(session_id), SessionKey::side_task(session_id)] {
            if self.remove(&key).await {
                removed += 1;
            }
        }
        removed
    }

    pub async fn clear(&self) {
        let drained: Vec<_> = self.engines.write().await.drain().collect();
        for (_, engine) in drained {
            engine.detach();
        }
    }

    pub async fn len(&self) -> usize {
        self.engines.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.engines.read().await.is_empty()
    }
}
