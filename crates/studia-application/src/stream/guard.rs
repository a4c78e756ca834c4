//! Resynchronization guard.
//!
//! Decides whether an externally supplied transcript may overwrite local
//! state. Local, recent, user-driven state always outranks externally
//! reasserted state.

use std::time::Duration;

use serde::Serialize;
use studia_core::session::{ChatMessage, MessageRole, count_role};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// A turn is streaming.
    TurnActive,
    /// The last turn completed too recently.
    ProtectionWindow { remaining_ms: u64 },
    /// The external transcript would drop user turns.
    UserTurnRegression { local: usize, external: usize },
    /// The external transcript is not longer than local state.
    LocalNotShorter { local: usize, external: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptReason {
    /// Nothing local to protect.
    ColdStart,
    /// Local state is behind (e.g. after a reload).
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum ResyncDecision {
    Accept(AcceptReason),
    Reject(RejectReason),
}

impl ResyncDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept(_))
    }
}

#[derive(Debug, Clone)]
pub struct ProtectionPolicy {
    window: Duration,
}

impl ProtectionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Evaluates the checks in order; the first that matches decides.
    pub fn evaluate(
        &self,
        local: &[ChatMessage],
        external: &[ChatMessage],
        turn_active: bool,
        completed_at: Option<Instant>,
        now: Instant,
    ) -> ResyncDecision {
        if turn_active {
            return ResyncDecision::Reject(RejectReason::TurnActive);
        }

        if let Some(completed_at) = completed_at {
            let elapsed = now.saturating_duration_since(completed_at);
            if elapsed < self.window {
                return ResyncDecision::Reject(RejectReason::ProtectionWindow {
                    remaining_ms: (self.window - elapsed).as_millis() as u64,
                });
            }
        }

        let local_users = count_role(local, MessageRole::User);
        let external_users = count_role(external, MessageRole::User);
        if external_users < local_users {
            return ResyncDecision::Reject(RejectReason::UserTurnRegression {
                local: local_users,
                external: external_users,
            });
        }

        if local.is_empty() {
            return ResyncDecision::Accept(AcceptReason::ColdStart);
        }

        if local.len() < external.len() {
            return ResyncDecision::Accept(AcceptReason::Recovery);
        }

        ResyncDecision::Reject(RejectReason::LocalNotShorter {
            local: local.len(),
            external: external.len(),
        })
    }
}
