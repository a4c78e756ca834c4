//! Channel naming.
//!
//! Channel names are the only protocol surface shared with the generation
//! backend. They must stay stable for a given `(session_id, scope,
//! turn_kind)` so the engine can re-attach after a reload.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::{SessionScope, TurnKind};

/// The three independently-timed event streams of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Content,
    Reasoning,
    Citations,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [Self::Content, Self::Reasoning, Self::Citations];
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Citations => write!(f, "citations"),
        }
    }
}

/// The channel-name combination a subscription set was opened for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelNames {
    pub content: String,
    pub reasoning: String,
    pub citations: String,
}

impl ChannelNames {
    /// Computes the channel names for a turn. Pure and deterministic.
    ///
    /// Side tasks use a `{scope}_summary_` namespace so they never collide
    /// with the main conversation of the same session. The per-kind suffix
    /// follows a `:` that never occurs in the encoded session id, so no two
    /// sessions can share a channel name.
    pub fn resolve(session_id: &str, scope: SessionScope, turn_kind: TurnKind) -> Self {
        let id = encode_session_id(session_id);
        let prefix = scope.channel_prefix();
        let base = match turn_kind {
            TurnKind::First => format!("{}_stream_{}", prefix, id),
            TurnKind::Followup => format!("{}_continuation_stream_{}", prefix, id),
            TurnKind::SideTask => format!("{}_summary_stream_{}", prefix, id),
        };

        Self {
            reasoning: format!("{}:reasoning", base),
            citations: format!("{}:rag_sources", base),
            content: base,
        }
    }

    pub fn name(&self, kind: ChannelKind) -> &str {
        match kind {
            ChannelKind::Content => &self.content,
            ChannelKind::Reasoning => &self.reasoning,
            ChannelKind::Citations => &self.citations,
        }
    }
}

/// Percent-escapes `%` and `:` so the kind separator stays unambiguous.
fn encode_session_id(session_id: &str) -> String {
    let mut encoded = String::with_capacity(session_id.len());
    for c in session_id.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            ':' => encoded.push_str("%3A"),
            _ => encoded.push(c),
        }
    }
    encoded
}

impl fmt::Display for ChannelNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn_names() {
        let names = ChannelNames::resolve("abc", SessionScope::StudyItem, TurnKind::First);
        assert_eq!(names.content, "analysis_stream_abc");
        assert_eq!(names.reasoning, "analysis_stream_abc:reasoning");
        assert_eq!(names.citations, "analysis_stream_abc:rag_sources");
    }

    #[test]
    fn test_followup_names_differ_from_first() {
        let first = ChannelNames::resolve("abc", SessionScope::Review, TurnKind::First);
        let followup = ChannelNames::resolve("abc", SessionScope::Review, TurnKind::Followup);
        assert_eq!(followup.content, "review_analysis_continuation_stream_abc");
        assert_ne!(first, followup);
    }

    #[test]
    fn test_side_task_never_collides_with_main() {
        for scope in [SessionScope::StudyItem, SessionScope::Batch, SessionScope::Review] {
            let side = ChannelNames::resolve("abc", scope, TurnKind::SideTask);
            for kind in [TurnKind::First, TurnKind::Followup] {
                let main = ChannelNames::resolve("abc", scope, kind);
                for channel in ChannelKind::ALL {
                    for other in ChannelKind::ALL {
                        assert_ne!(side.name(channel), main.name(other));
                    }
                }
            }
        }
    }

    #[test]
    fn test_side_task_names_carry_scope() {
        let study = ChannelNames::resolve("abc", SessionScope::StudyItem, TurnKind::SideTask);
        let batch = ChannelNames::resolve("abc", SessionScope::Batch, TurnKind::SideTask);
        assert_eq!(study.content, "analysis_summary_stream_abc");
        assert_eq!(batch.content, "batch_analysis_summary_stream_abc");
    }

    #[test]
    fn test_suffixed_session_ids_do_not_alias() {
        let kinds = [TurnKind::First, TurnKind::Followup, TurnKind::SideTask];
        let ids = ["s1", "s1_reasoning", "s1:reasoning", "s1%3Areasoning", "s1_rag_sources"];

        let mut seen = std::collections::HashSet::new();
        for id in ids {
            for kind in kinds {
                let names = ChannelNames::resolve(id, SessionScope::StudyItem, kind);
                for channel in ChannelKind::ALL {
                    assert!(
                        seen.insert(names.name(channel).to_string()),
                        "duplicate channel {}",
                        names.name(channel)
                    );
                }
            }
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = ChannelNames::resolve("s-1", SessionScope::Batch, TurnKind::Followup);
        let b = ChannelNames::resolve("s-1", SessionScope::Batch, TurnKind::Followup);
        assert_eq!(a, b);
    }
}
