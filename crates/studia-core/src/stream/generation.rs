//! Generation trigger contract.
//!
//! The engine decides nothing about what gets generated; it only asks the
//! backend to start or continue a turn and then listens on the channels.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{ChatMessage, TurnKind};

/// Inputs forwarded untouched to the generation backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnInputs {
    /// Question or instruction for the turn.
    pub prompt: String,
    /// Attachment references (e.g. OCR'd page images).
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Ask the backend to stream a reasoning trace.
    #[serde(default)]
    pub enable_reasoning: bool,
    /// Ask the backend to ground the answer with retrieval citations.
    #[serde(default)]
    pub enable_retrieval: bool,
}

impl TurnInputs {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Returned by the backend when a turn has been initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTicket {
    /// Identifier the backend derives channel names from.
    pub channel_seed: String,
}

/// Starts and continues generation on the backend.
#[async_trait]
pub trait GenerationTrigger: Send + Sync {
    /// Starts a new turn for `session_id`.
    async fn initiate_turn(
        &self,
        session_id: &str,
        turn_kind: TurnKind,
        inputs: &TurnInputs,
    ) -> Result<TurnTicket>;

    /// Continues the conversation with the full history (follow-ups).
    async fn continue_turn(&self, session_id: &str, history: &[ChatMessage]) -> Result<()>;
}
