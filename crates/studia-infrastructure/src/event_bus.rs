//! In-process named event bus.
//!
//! Delivers payloads synchronously to every handler registered for a
//! channel, in publish order. Used by the CLI and by tests in place of the
//! desktop shell's event system.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use studia_core::error::{Result, StudiaError};
use studia_core::stream::{ChannelPayload, EventBus, EventHandler, SubscriptionHandle};

#[derive(Default)]
struct BusState {
    next_listener_id: u64,
    channels: HashMap<String, Vec<(u64, EventHandler)>>,
    rejected: HashSet<String>,
    closed: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<Mutex<BusState>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `payload` to every listener of `channel`.
    ///
    /// Handlers run after the bus lock is released, so a handler may
    /// subscribe or unsubscribe without deadlocking.
    ///
    /// # Returns
    ///
    /// The number of listeners the payload was delivered to.
    pub fn publish(&self, channel: &str, payload: ChannelPayload) -> usize {
        let handlers: Vec<EventHandler> = {
            let state = self.lock();
            state
                .channels
                .get(channel)
                .map(|listeners| listeners.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        if handlers.is_empty() {
            tracing::trace!("[EventBus] No listeners on '{}'", channel);
        }

        for handler in &handlers {
            handler(payload.clone());
        }
        handlers.len()
    }

    /// Parses a JSON payload (as emitted by the backend) and publishes it.
    pub fn publish_json(&self, channel: &str, json: &str) -> Result<usize> {
        let payload: ChannelPayload = serde_json::from_str(json)?;
        Ok(self.publish(channel, payload))
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.lock().channels.get(channel).map_or(0, Vec::len)
    }

    /// Total listeners across all channels.
    pub fn total_listeners(&self) -> usize {
        self.lock().channels.values().map(Vec::len).sum()
    }

    /// Makes future subscriptions to `channel` fail.
    pub fn reject_channel(&self, channel: impl Into<String>) {
        self.lock().rejected.insert(channel.into());
    }

    /// Makes every future subscription fail.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventBus for InMemoryEventBus {
    fn subscribe(&self, channel: &str, handler: EventHandler) -> Result<SubscriptionHandle> {
        let id = {
            let mut state = self.lock();
            if state.closed {
                return Err(StudiaError::channel_attach(channel, "event bus is closed"));
            }
            if state.rejected.contains(channel) {
                return Err(StudiaError::channel_attach(channel, "channel rejected"));
            }
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            state
                .channels
                .entry(channel.to_string())
                .or_default()
                .push((id, handler));
            id
        };

        tracing::trace!("[EventBus] Listener {} subscribed to '{}'", id, channel);

        let weak: Weak<Mutex<BusState>> = Arc::downgrade(&self.state);
        let channel_name = channel.to_string();
        Ok(SubscriptionHandle::new(channel, move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(listeners) = state.channels.get_mut(&channel_name) {
                listeners.retain(|(listener_id, _)| *listener_id != id);
                if listeners.is_empty() {
                    state.channels.remove(&channel_name);
                }
            }
        }))
    }
}
