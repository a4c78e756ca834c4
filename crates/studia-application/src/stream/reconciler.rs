//! Stream reconciliation.
//!
//! Merges content, reasoning and citation deliveries into the transcript.
//! The reconciler only mutates `StreamState`; timers, subscriptions and
//! lifecycle notifications are the caller's job, driven by the returned
//! [`EventDisposition`].

use studia_core::session::TargetResolution;
use studia_core::stream::{ChannelKind, ChannelPayload};
use tokio::time::Instant;

use super::state::{StreamState, TurnOutcome, TurnPhase};

/// What applying a delivery did.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDisposition {
    /// Same token as the previous delivery on this channel; nothing changed.
    DuplicateIgnored,
    /// Content arrived while no turn was in flight.
    Stale,
    /// A content chunk was appended.
    ChunkApplied { index: usize, first_event: bool },
    /// The content stream completed and the turn was finalized.
    TurnCompleted { index: usize, used_payload: bool },
    /// Reasoning text was appended (or replaced on completion).
    ReasoningApplied {
        resolution: TargetResolution,
        replaced: bool,
    },
    /// Citations were attached (last write wins).
    CitationsApplied { index: usize, count: usize },
    /// The delivery could not be placed anywhere.
    Dropped { reason: &'static str },
}

impl EventDisposition {
    /// True for dispositions produced by the content channel that count as
    /// "an event arrived" for the timeout supervisor.
    pub fn is_content_activity(&self) -> bool {
        matches!(self, Self::ChunkApplied { .. } | Self::TurnCompleted { .. })
    }
}

#[derive(Debug, Clone)]
pub struct StreamReconciler {
    completion_override_ratio: f64,
}

impl StreamReconciler {
    pub fn new(completion_override_ratio: f64) -> Self {
        Self {
            completion_override_ratio,
        }
    }

    /// Applies one delivery received on `channel` (of kind `kind`).
    pub fn apply(
        &self,
        state: &mut StreamState,
        kind: ChannelKind,
        channel: &str,
        payload: &ChannelPayload,
        now: Instant,
    ) -> EventDisposition {
        if state.dedup.is_duplicate(channel, payload) {
            return EventDisposition::DuplicateIgnored;
        }

        match kind {
            ChannelKind::Content if payload.is_complete => self.complete(state, payload, now),
            ChannelKind::Content => Self::append_chunk(state, payload),
            ChannelKind::Reasoning => Self::apply_reasoning(state, payload),
            ChannelKind::Citations => Self::apply_citations(state, payload),
        }
    }

    fn append_chunk(state: &mut StreamState, payload: &ChannelPayload) -> EventDisposition {
        if state.is_idle() {
            return EventDisposition::Stale;
        }
        let Some(index) = state.content_target() else {
            return EventDisposition::Dropped {
                reason: "transcript is empty",
            };
        };

        let first_event = state.phase == TurnPhase::AwaitingFirstEvent;
        state.phase = TurnPhase::Streaming;
        state.transcript.append_content(index, payload.content_str());

        EventDisposition::ChunkApplied { index, first_event }
    }

    fn complete(
        &self,
        state: &mut StreamState,
        payload: &ChannelPayload,
        now: Instant,
    ) -> EventDisposition {
        if state.is_idle() {
            return EventDisposition::Stale;
        }
        let Some(index) = state.content_target() else {
            return EventDisposition::Dropped {
                reason: "transcript is empty",
            };
        };

        let buffer = state.transcript.content_at(index).unwrap_or_default();
        let used_payload = match payload.content.as_deref() {
            Some(full_text) if self.prefer_payload(buffer, full_text) => {
                state.transcript.set_content(index, full_text.to_string());
                true
            }
            _ => false,
        };

        state.finalize(TurnOutcome::Completed, now);
        EventDisposition::TurnCompleted {
            index,
            used_payload,
        }
    }

    /// The streamed buffer wins unless it is empty or the completion
    /// snapshot is materially longer.
    fn prefer_payload(&self, buffer: &str, full_text: &str) -> bool {
        if full_text.is_empty() {
            return false;
        }
        let buffer_chars = buffer.chars().count();
        if buffer_chars == 0 {
            return true;
        }
        full_text.chars().count() as f64 > buffer_chars as f64 * self.completion_override_ratio
    }

    fn apply_reasoning(state: &mut StreamState, payload: &ChannelPayload) -> EventDisposition {
        let Some(resolution) = state.transcript.resolve_target(state.active_turn) else {
            return EventDisposition::Dropped {
                reason: "transcript is empty",
            };
        };
        let index = resolution.index();

        let applied = match payload.content.as_deref() {
            Some(text) if payload.is_complete && !text.is_empty() => {
                state.transcript.replace_reasoning(index, text.to_string())
            }
            Some(text) if !payload.is_complete => state.transcript.append_reasoning(index, text),
            // Completion without a snapshot keeps what was accumulated
            _ => state.transcript.get(index).is_some_and(|m| m.is_assistant()),
        };

        if !applied {
            return EventDisposition::Dropped {
                reason: "reasoning target is not an assistant turn",
            };
        }

        EventDisposition::ReasoningApplied {
            resolution,
            replaced: payload.is_complete && !payload.content_str().is_empty(),
        }
    }

    fn apply_citations(state: &mut StreamState, payload: &ChannelPayload) -> EventDisposition {
        let Some(citations) = payload.citations.clone() else {
            return EventDisposition::Dropped {
                reason: "citation delivery without sources",
            };
        };
        let Some(resolution) = state.transcript.resolve_target(state.active_turn) else {
            return EventDisposition::Dropped {
                reason: "transcript is empty",
            };
        };

        let index = resolution.index();
        let count = citations.len();
        if !state.transcript.set_citations(index, citations) {
            return EventDisposition::Dropped {
                reason: "citation target out of bounds",
            };
        }
        EventDisposition::CitationsApplied { index, count }
    }
}
