use serde::{Deserialize, Serialize};

use crate::session::Citation;

/// A single delivery on a named channel.
///
/// Content and reasoning channels carry `content` chunks and a final
/// `is_complete` signal (optionally with the full text). The citation
/// channel carries `citations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl ChannelPayload {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Completion without a full-text snapshot.
    pub fn complete() -> Self {
        Self {
            is_complete: true,
            ..Self::default()
        }
    }

    /// Completion carrying the producer's full-text snapshot.
    pub fn complete_with(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_complete: true,
            citations: None,
        }
    }

    pub fn citations(citations: Vec<Citation>) -> Self {
        Self {
            citations: Some(citations),
            ..Self::default()
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
