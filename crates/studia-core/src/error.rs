//! Error types for the Studia engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the Studia crates.
///
/// Expected guard outcomes (duplicate deliveries, rejected resyncs, index
/// fallbacks) are not errors and are modelled as values elsewhere.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StudiaError {
    /// A channel subscription could not be installed.
    #[error("Failed to attach channel '{channel}': {message}")]
    ChannelAttach { channel: String, message: String },

    /// No event arrived before the turn timeout elapsed.
    #[error("Stream stalled for session '{session_id}'")]
    StreamStalled { session_id: String },

    /// The generation collaborator failed to start or continue a turn.
    #[error("Generation error: {0}")]
    Generation(String),

    /// The engine is not in a state that permits the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StudiaError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a ChannelAttach error
    pub fn channel_attach(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChannelAttach {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Creates a StreamStalled error
    pub fn stream_stalled(session_id: impl Into<String>) -> Self {
        Self::StreamStalled {
            session_id: session_id.into(),
        }
    }

    /// Creates a Generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Creates an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a ChannelAttach error
    pub fn is_channel_attach(&self) -> bool {
        matches!(self, Self::ChannelAttach { .. })
    }

    /// Recoverable errors finalize the turn with partial content instead of
    /// aborting it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StreamStalled { .. } | Self::Generation(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for StudiaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for StudiaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StudiaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for StudiaError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for StudiaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, StudiaError>`.
pub type Result<T> = std::result::Result<T, StudiaError>;
