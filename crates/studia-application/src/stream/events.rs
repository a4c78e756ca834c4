use serde::Serialize;
use studia_core::error::StudiaError;
use studia_core::session::TurnKind;
use studia_core::stream::ChannelNames;

use super::guard::RejectReason;
use super::state::TurnOutcome;

/// Lifecycle signals published by a conversation engine.
///
/// The presentation layer renders from these; the owning application
/// persists the transcript on `TurnFinalized`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    TurnStarted {
        session_id: String,
        turn_kind: TurnKind,
        index: usize,
        channels: ChannelNames,
    },
    ContentUpdated {
        session_id: String,
        index: usize,
        length: usize,
    },
    ReasoningUpdated {
        session_id: String,
        index: usize,
        /// The target index had to be inferred.
        fallback: bool,
    },
    CitationsAttached {
        session_id: String,
        index: usize,
        count: usize,
    },
    TurnFinalized {
        session_id: String,
        index: Option<usize>,
        outcome: TurnOutcome,
    },
    /// The turn timed out; it was finalized with partial content.
    StreamStalled {
        session_id: String,
        error: StudiaError,
    },
    TurnErrored {
        session_id: String,
        error: StudiaError,
    },
    ResyncApplied {
        session_id: String,
        turns: usize,
    },
    ResyncRejected {
        session_id: String,
        reason: RejectReason,
    },
}

impl EngineEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::TurnStarted { session_id, .. }
            | Self::ContentUpdated { session_id, .. }
            | Self::ReasoningUpdated { session_id, .. }
            | Self::CitationsAttached { session_id, .. }
            | Self::TurnFinalized { session_id, .. }
            | Self::StreamStalled { session_id, .. }
            | Self::TurnErrored { session_id, .. }
            | Self::ResyncApplied { session_id, .. }
            | Self::ResyncRejected { session_id, .. } => session_id,
        }
    }
}
