//! Transcript store.
//!
//! The ordered list of turns plus a side map of reasoning text keyed by
//! turn position. This is the single source of truth the presentation layer
//! renders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, Citation, MessageRole};

/// Turn index → accumulated reasoning text.
pub type ReasoningMap = BTreeMap<usize, String>;

/// How a reasoning or citation target index was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetResolution {
    /// The active-turn pointer addressed an assistant turn.
    ActiveTurn(usize),
    /// Nearest assistant turn found scanning backward.
    NearestAssistant(usize),
    /// Last index, clamped to bounds.
    LastIndex(usize),
}

impl TargetResolution {
    pub fn index(&self) -> usize {
        match *self {
            Self::ActiveTurn(index) | Self::NearestAssistant(index) | Self::LastIndex(index) => {
                index
            }
        }
    }

    /// True when the active pointer could not be used directly.
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::ActiveTurn(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    #[serde(default)]
    reasoning: ReasoningMap,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(messages: Vec<ChatMessage>, reasoning: ReasoningMap) -> Self {
        Self {
            messages,
            reasoning,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn reasoning(&self) -> &ReasoningMap {
        &self.reasoning
    }

    pub fn reasoning_for(&self, index: usize) -> Option<&str> {
        self.reasoning.get(&index).map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn user_turn_count(&self) -> usize {
        count_role(&self.messages, MessageRole::User)
    }

    pub fn last_assistant_index(&self) -> Option<usize> {
        self.messages.iter().rposition(ChatMessage::is_assistant)
    }

    /// Appends a turn and returns its index.
    pub fn push(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Appends streamed text to the turn at `index`.
    ///
    /// Returns `false` when the index is out of bounds.
    pub fn append_content(&mut self, index: usize, chunk: &str) -> bool {
        match self.messages.get_mut(index) {
            Some(message) => {
                message.content.push_str(chunk);
                true
            }
            None => false,
        }
    }

    pub fn set_content(&mut self, index: usize, content: String) -> bool {
        match self.messages.get_mut(index) {
            Some(message) => {
                message.content = content;
                true
            }
            None => false,
        }
    }

    pub fn content_at(&self, index: usize) -> Option<&str> {
        self.messages.get(index).map(|m| m.content.as_str())
    }

    /// Last-write-wins citation attachment.
    pub fn set_citations(&mut self, index: usize, citations: Vec<Citation>) -> bool {
        match self.messages.get_mut(index) {
            Some(message) => {
                message.citations = Some(citations);
                true
            }
            None => false,
        }
    }

    /// Appends reasoning text for the turn at `index`.
    ///
    /// Only assistant turns may carry reasoning; returns `false` otherwise.
    pub fn append_reasoning(&mut self, index: usize, chunk: &str) -> bool {
        if !self.is_assistant_at(index) {
            return false;
        }
        self.reasoning.entry(index).or_default().push_str(chunk);
        self.messages[index].reasoning_ref = Some(index);
        true
    }

    /// Replaces the reasoning entry for the turn at `index`.
    pub fn replace_reasoning(&mut self, index: usize, text: String) -> bool {
        if !self.is_assistant_at(index) {
            return false;
        }
        self.reasoning.insert(index, text);
        self.messages[index].reasoning_ref = Some(index);
        true
    }

    /// Replaces the whole transcript (accepted resync).
    ///
    /// Reasoning entries that do not address an assistant turn of the new
    /// message list are discarded.
    pub fn replace_all(&mut self, messages: Vec<ChatMessage>, reasoning: ReasoningMap) {
        self.messages = messages;
        self.reasoning = reasoning
            .into_iter()
            .filter(|(index, _)| self.is_assistant_at(*index))
            .collect();
        for index in self.reasoning.keys() {
            self.messages[*index].reasoning_ref = Some(*index);
        }
    }

    pub fn into_parts(self) -> (Vec<ChatMessage>, ReasoningMap) {
        (self.messages, self.reasoning)
    }

    /// Picks the turn a reasoning (or citation) event belongs to.
    ///
    /// Priority: the active pointer if it addresses an assistant turn, then
    /// the nearest assistant turn scanning backward, then the last index.
    /// Returns `None` only for an empty transcript.
    pub fn resolve_target(&self, active_turn: Option<usize>) -> Option<TargetResolution> {
        if self.messages.is_empty() {
            return None;
        }

        if let Some(index) = active_turn
            && self.is_assistant_at(index)
        {
            return Some(TargetResolution::ActiveTurn(index));
        }

        if let Some(index) = self.last_assistant_index() {
            return Some(TargetResolution::NearestAssistant(index));
        }

        let last = self.messages.len() - 1;
        Some(TargetResolution::LastIndex(active_turn.unwrap_or(last).min(last)))
    }

    fn is_assistant_at(&self, index: usize) -> bool {
        self.messages
            .get(index)
            .is_some_and(ChatMessage::is_assistant)
    }
}

/// Counts the turns with the given role.
pub fn count_role(messages: &[ChatMessage], role: MessageRole) -> usize {
    messages.iter().filter(|m| m.role == role).count()
}
