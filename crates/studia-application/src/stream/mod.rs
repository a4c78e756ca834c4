//! Streaming reconciliation components.
//!
//! - `router`: one live subscription set per session lane
//! - `dedup`: duplicate delivery filter
//! - `reconciler`: merges channel deliveries into the transcript
//! - `guard`: decides whether external resyncs may overwrite local state
//! - `supervisor`: per-turn timeout
//! - `state`: turn phase, outcome and busy state
//! - `events`: lifecycle signals

mod dedup;
mod events;
mod guard;
mod reconciler;
mod router;
mod state;
mod supervisor;

pub use dedup::{DedupFilter, DedupToken};
pub use events::EngineEvent;
pub use guard::{AcceptReason, ProtectionPolicy, RejectReason, ResyncDecision};
pub use reconciler::{EventDisposition, StreamReconciler};
pub use router::{AttachOutcome, ChannelHandlers, SubscriptionRouter, SubscriptionSet};
pub use state::{BusyState, StreamState, TurnOutcome, TurnPhase};
pub use supervisor::TimeoutSupervisor;
