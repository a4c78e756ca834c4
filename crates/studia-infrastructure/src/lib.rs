//! Infrastructure adapters for Studia.
//!
//! Concrete implementations of the core contracts (event bus, session
//! store) plus configuration loading, path resolution and logging setup.

pub mod config_service;
pub mod event_bus;
pub mod logging;
pub mod paths;
pub mod session_store;

pub use config_service::ConfigService;
pub use event_bus::InMemoryEventBus;
pub use paths::StudiaPaths;
pub use session_store::{InMemorySessionStore, JsonSessionStore};
