//! Conversation message types.
//!
//! This module contains types for representing turns in a study
//! conversation, including roles, content and retrieval citations.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System-generated message.
    System,
}

/// A retrieval source referenced by an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub chunk_text: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub chunk_index: usize,
}

/// A single turn in a conversation transcript.
///
/// Assistant turns are created empty when a stream starts and grow as
/// chunks arrive; they are treated as immutable once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format).
    #[serde(default)]
    pub timestamp: String,
    /// Retrieval sources attached near the end of an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    /// Key into the transcript's reasoning map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_ref: Option<usize>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            citations: None,
            reasoning_ref: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}
