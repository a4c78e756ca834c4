//! Streaming contracts.
//!
//! Channel naming, channel payloads, and the traits for the two external
//! collaborators the engine consumes (event bus and generation trigger).

mod bus;
mod channel;
mod generation;
mod payload;

pub use bus::{EventBus, EventHandler, SubscriptionHandle};
pub use channel::{ChannelKind, ChannelNames};
pub use generation::{GenerationTrigger, TurnInputs, TurnTicket};
pub use payload::ChannelPayload;
