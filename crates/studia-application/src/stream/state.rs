//! Per-turn state machine.
//!
//! `Idle → AwaitingFirstEvent → Streaming → {Completed | TimedOut | Errored
//! | Cancelled} → Idle`. Terminal outcomes are recorded in `last_outcome`
//! and the phase drops back to `Idle` in the same step.

use serde::{Deserialize, Serialize};
use studia_core::session::Transcript;
use tokio::time::Instant;

use super::dedup::DedupFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    AwaitingFirstEvent,
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    TimedOut,
    Errored,
    Cancelled,
}

/// Input-lock signal for the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyState {
    pub is_generating: bool,
    pub is_awaiting_first_token: bool,
}

/// Everything the reconciler mutates for one session lane.
#[derive(Debug)]
pub struct StreamState {
    pub transcript: Transcript,
    pub phase: TurnPhase,
    /// Transcript index currently receiving streamed content.
    pub active_turn: Option<usize>,
    /// Incremented for every started turn; timers compare against it.
    pub turn_id: u64,
    /// Start of the protection window of the last completed turn.
    pub completed_at: Option<Instant>,
    pub last_outcome: Option<TurnOutcome>,
    pub dedup: DedupFilter,
}

impl StreamState {
    pub fn new(transcript: Transcript, dedup_prefix_chars: usize) -> Self {
        Self {
            transcript,
            phase: TurnPhase::Idle,
            active_turn: None,
            turn_id: 0,
            completed_at: None,
            last_outcome: None,
            dedup: DedupFilter::new(dedup_prefix_chars),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TurnPhase::Idle
    }

    pub fn busy_state(&self) -> BusyState {
        BusyState {
            is_generating: !self.is_idle(),
            is_awaiting_first_token: self.phase == TurnPhase::AwaitingFirstEvent,
        }
    }

    /// Moves into `AwaitingFirstEvent` for the turn at `index`.
    pub fn begin(&mut self, index: usize) -> u64 {
        self.turn_id += 1;
        self.active_turn = Some(index);
        self.phase = TurnPhase::AwaitingFirstEvent;
        self.last_outcome = None;
        self.turn_id
    }

    /// Ends the in-flight turn and returns the index it was writing to.
    ///
    /// Only a normal completion opens the protection window.
    pub fn finalize(&mut self, outcome: TurnOutcome, now: Instant) -> Option<usize> {
        let index = self.active_turn.take();
        self.phase = TurnPhase::Idle;
        self.last_outcome = Some(outcome);
        if outcome == TurnOutcome::Completed {
            self.completed_at = Some(now);
        }
        index
    }

    /// The index streamed content goes to: the active pointer when it is in
    /// bounds, else the last transcript position.
    pub fn content_target(&self) -> Option<usize> {
        let len = self.transcript.len();
        match self.active_turn {
            Some(index) if index < len => Some(index),
            _ => len.checked_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studia_core::session::ChatMessage;
    use studia_core::stream::ChannelPayload;

    #[test]
    fn test_begin_keeps_dedup_history() {
        let mut state = StreamState::new(Transcript::new(), 64);
        let done = ChannelPayload::complete_with("Because");
        assert!(!state.dedup.is_duplicate("c", &done));

        let index = state.transcript.push(ChatMessage::assistant(""));
        state.begin(index);
        assert!(state.dedup.is_duplicate("c", &done));
    }

    #[test]
    fn test_begin_and_finalize() {
        let mut state = StreamState::new(Transcript::new(), 64);
        let index = state.transcript.push(ChatMessage::assistant(""));
        let turn_id = state.begin(index);

        assert_eq!(turn_id, 1);
        assert_eq!(
            state.busy_state(),
            BusyState {
                is_generating: true,
                is_awaiting_first_token: true
            }
        );

        let now = Instant::now();
        assert_eq!(state.finalize(TurnOutcome::TimedOut, now), Some(index));
        assert!(state.is_idle());
        assert!(state.completed_at.is_none());
        assert_eq!(state.busy_state(), BusyState::default());
    }

    #[test]
    fn test_content_target_falls_back_to_last() {
        let mut state = StreamState::new(Transcript::new(), 64);
        assert_eq!(state.content_target(), None);

        state.transcript.push(ChatMessage::user("q"));
        state.transcript.push(ChatMessage::assistant(""));
        state.active_turn = Some(5);
        assert_eq!(state.content_target(), Some(1));

        state.active_turn = Some(0);
        assert_eq!(state.content_target(), Some(0));
    }
}
