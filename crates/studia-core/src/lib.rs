//! Domain layer for Studia.
//!
//! Types and contracts shared by the streaming engine and its adapters:
//! transcripts, channel naming, payloads, collaborator traits, errors and
//! configuration.

pub mod config;
pub mod error;
pub mod session;
pub mod stream;

// Re-export common error type
pub use error::{Result, StudiaError};
