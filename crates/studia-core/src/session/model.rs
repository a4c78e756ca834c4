//! Session classification types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::transcript::Transcript;

/// What a conversation is about. Each scope has its own channel prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionScope {
    /// A single study item (question, mistake, note).
    #[default]
    StudyItem,
    /// A batch of items analysed together.
    Batch,
    /// A review task over previously studied items.
    Review,
}

impl SessionScope {
    pub fn channel_prefix(&self) -> &'static str {
        match self {
            Self::StudyItem => "analysis",
            Self::Batch => "batch_analysis",
            Self::Review => "review_analysis",
        }
    }
}

/// Which conversation inside a session a turn belongs to.
///
/// A side task (e.g. a summary) borrows the session id but not the message
/// history, so it runs in its own lane next to the main conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionLane {
    Main,
    SideTask,
}

impl fmt::Display for SessionLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::SideTask => write!(f, "side_task"),
        }
    }
}

/// The kind of turn being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    First,
    Followup,
    SideTask,
}

impl TurnKind {
    /// Canonical turn-kind rule.
    ///
    /// Side-task lanes are always `SideTask`. A main lane is a continuation
    /// iff the transcript holds any user turn; since user turns are never
    /// removed, a session that switched to continuation names stays there.
    pub fn classify(transcript: &Transcript, lane: SessionLane) -> Self {
        match lane {
            SessionLane::SideTask => Self::SideTask,
            SessionLane::Main if transcript.user_turn_count() > 0 => Self::Followup,
            SessionLane::Main => Self::First,
        }
    }
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Followup => write!(f, "followup"),
            Self::SideTask => write!(f, "side_task"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatMessage;

    #[test]
    fn test_classify_main_lane() {
        let mut transcript = Transcript::new();
        assert_eq!(TurnKind::classify(&transcript, SessionLane::Main), TurnKind::First);

        transcript.push(ChatMessage::assistant("analysis"));
        assert_eq!(TurnKind::classify(&transcript, SessionLane::Main), TurnKind::First);

        transcript.push(ChatMessage::user("follow up"));
        assert_eq!(
            TurnKind::classify(&transcript, SessionLane::Main),
            TurnKind::Followup
        );
    }

    #[test]
    fn test_classify_side_task_ignores_history() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user("question"));
        assert_eq!(
            TurnKind::classify(&transcript, SessionLane::SideTask),
            TurnKind::SideTask
        );
    }
}
