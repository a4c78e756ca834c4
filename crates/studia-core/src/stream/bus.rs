//! Named event channel bus contract.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::payload::ChannelPayload;
use crate::error::Result;

/// Callback invoked for every delivery on a subscribed channel.
pub type EventHandler = Arc<dyn Fn(ChannelPayload) + Send + Sync>;

/// A bus that delivers payloads on named channels.
///
/// Delivery is at-least-once: subscribers must tolerate duplicates.
/// Deliveries on one channel arrive in publish order; no order is
/// guaranteed across channels.
pub trait EventBus: Send + Sync {
    /// Registers `handler` for `channel` and returns the capability that
    /// removes it again.
    fn subscribe(&self, channel: &str, handler: EventHandler) -> Result<SubscriptionHandle>;
}

/// Opaque unsubscribe capability for one channel listener.
///
/// Unsubscribing is idempotent and also happens on drop.
pub struct SubscriptionHandle {
    id: Uuid,
    channel: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(channel: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_live(&self) -> bool {
        self.release.is_some()
    }

    /// Removes the listener. Returns `false` if it was already released.
    pub fn unsubscribe(&mut self) -> bool {
        match self.release.take() {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut handle = SubscriptionHandle::new("analysis_stream_a", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());
        drop(handle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _handle = SubscriptionHandle::new("c", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
