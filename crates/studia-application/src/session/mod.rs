//! Session application services.
//!
//! This module contains the per-lane conversation engine, the registry that
//! owns engines per session, and transcript persistence.

mod engine;
mod persistence;
mod registry;

pub use engine::ConversationEngine;
pub use persistence::TranscriptPersister;
pub use registry::{SessionKey, SessionRegistry};
