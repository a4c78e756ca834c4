//! Session domain module.
//!
//! # Module Structure
//!
//! - `message`: Turn types (`MessageRole`, `ChatMessage`, `Citation`)
//! - `model`: Session classification (`SessionScope`, `SessionLane`, `TurnKind`)
//! - `transcript`: The mutable transcript store and reasoning map
//! - `store`: Persistence trait for the owning application

mod message;
mod model;
mod store;
mod transcript;

pub use message::{ChatMessage, Citation, MessageRole};
pub use model::{SessionLane, SessionScope, TurnKind};
pub use store::SessionStore;
pub use transcript::{ReasoningMap, TargetResolution, Transcript, count_role};
