//! Duplicate delivery filter.
//!
//! The bus delivers at-least-once. A delivery whose token equals the
//! previous token seen on the same channel is discarded.

use std::collections::HashMap;

use studia_core::stream::ChannelPayload;

/// Fingerprint of one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupToken {
    channel: String,
    prefix: String,
    content_chars: usize,
    citation_count: usize,
    is_complete: bool,
}

impl DedupToken {
    pub fn from_payload(channel: &str, payload: &ChannelPayload, prefix_chars: usize) -> Self {
        let (prefix, content_chars) = match &payload.content {
            Some(content) => (
                content.chars().take(prefix_chars).collect(),
                content.chars().count(),
            ),
            None => (citation_prefix(payload, prefix_chars), 0),
        };

        Self {
            channel: channel.to_string(),
            prefix,
            content_chars,
            citation_count: payload.citations.as_ref().map_or(0, Vec::len),
            is_complete: payload.is_complete,
        }
    }
}

fn citation_prefix(payload: &ChannelPayload, prefix_chars: usize) -> String {
    payload
        .citations
        .iter()
        .flatten()
        .flat_map(|c| c.document_id.chars().chain(c.file_name.chars()))
        .take(prefix_chars)
        .collect()
}

#[derive(Debug, Default)]
pub struct DedupFilter {
    prefix_chars: usize,
    last: HashMap<String, DedupToken>,
}

impl DedupFilter {
    pub fn new(prefix_chars: usize) -> Self {
        Self {
            prefix_chars,
            last: HashMap::new(),
        }
    }

    /// Records the delivery and reports whether it repeats the previous one
    /// on its channel.
    pub fn is_duplicate(&mut self, channel: &str, payload: &ChannelPayload) -> bool {
        let token = DedupToken::from_payload(channel, payload, self.prefix_chars);
        if self.last.get(channel) == Some(&token) {
            return true;
        }
        self.last.insert(channel.to_string(), token);
        false
    }
}
