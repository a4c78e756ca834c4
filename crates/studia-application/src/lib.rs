//! Application layer for Studia.
//!
//! Coordinates the domain types of `studia-core` into running conversation
//! engines: channel subscriptions, stream reconciliation, turn timeouts and
//! the resync guard.

pub mod session;
pub mod stream;

pub use session::{ConversationEngine, SessionKey, SessionRegistry, TranscriptPersister};
pub use stream::{BusyState, EngineEvent, ResyncDecision, TurnOutcome};
