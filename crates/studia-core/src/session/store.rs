//! Session store trait.
//!
//! Defines the interface the owning application uses to persist a
//! transcript once the engine reports a finalized turn.

use async_trait::async_trait;

use super::transcript::Transcript;
use crate::error::Result;

/// An abstract store for transcript persistence.
///
/// The engine never calls this itself; it is driven by whoever listens to
/// the engine's `TurnFinalized` events.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Saves the transcript (messages and reasoning map) for a session.
    async fn persist(&self, session_id: &str, transcript: &Transcript) -> Result<()>;

    /// Loads a previously persisted transcript.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Transcript))`: Transcript found
    /// - `Ok(None)`: Nothing persisted for this session
    /// - `Err(_)`: Error occurred during retrieval
    async fn load(&self, session_id: &str) -> Result<Option<Transcript>>;

    /// Deletes a persisted transcript (no-op if missing).
    async fn delete(&self, session_id: &str) -> Result<()>;
}
