//! Event subscription routing.
//!
//! Owns the single live subscription set of a session lane. Every set gets
//! a fresh generation number; handlers are built for that generation, so a
//! callback that fires after its set was replaced or detached can tell it
//! is stale.

use std::sync::Arc;

use studia_core::error::Result;
use studia_core::stream::{ChannelKind, ChannelNames, EventBus, EventHandler, SubscriptionHandle};

/// One handler per channel kind.
pub struct ChannelHandlers {
    pub content: EventHandler,
    pub reasoning: EventHandler,
    pub citations: EventHandler,
}

impl ChannelHandlers {
    pub fn for_kind(&self, kind: ChannelKind) -> EventHandler {
        match kind {
            ChannelKind::Content => self.content.clone(),
            ChannelKind::Reasoning => self.reasoning.clone(),
            ChannelKind::Citations => self.citations.clone(),
        }
    }
}

/// The listeners currently installed for one session lane.
#[derive(Debug)]
pub struct SubscriptionSet {
    names: ChannelNames,
    generation: u64,
    handles: Vec<SubscriptionHandle>,
}

impl SubscriptionSet {
    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn dispose(mut self) {
        for handle in &mut self.handles {
            handle.unsubscribe();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A new set was installed.
    Installed { generation: u64 },
    /// Same names while a turn is streaming; the existing set was kept.
    Unchanged { generation: u64 },
}

impl AttachOutcome {
    pub fn generation(&self) -> u64 {
        match *self {
            Self::Installed { generation } | Self::Unchanged { generation } => generation,
        }
    }
}

pub struct SubscriptionRouter {
    bus: Arc<dyn EventBus>,
    current: Option<SubscriptionSet>,
    next_generation: u64,
}

impl SubscriptionRouter {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus,
            current: None,
            next_generation: 1,
        }
    }

    /// Installs listeners for `names`, disposing the previous set first.
    ///
    /// `make_handlers` receives the generation the new set will carry. When
    /// any channel fails to subscribe, the listeners opened so far are
    /// released and no set is live afterwards.
    pub fn attach<F>(
        &mut self,
        names: ChannelNames,
        turn_streaming: bool,
        make_handlers: F,
    ) -> Result<AttachOutcome>
    where
        F: FnOnce(u64) -> ChannelHandlers,
    {
        if turn_streaming
            && let Some(current) = &self.current
            && current.names == names
        {
            tracing::debug!(
                "[Router] Keeping live subscriptions for '{}' (turn streaming)",
                names
            );
            return Ok(AttachOutcome::Unchanged {
                generation: current.generation,
            });
        }

        self.detach();

        let generation = self.next_generation;
        self.next_generation += 1;
        let handlers = make_handlers(generation);

        let mut handles = Vec::with_capacity(ChannelKind::ALL.len());
        for kind in ChannelKind::ALL {
            let channel = names.name(kind);
            match self.bus.subscribe(channel, handlers.for_kind(kind)) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!("[Router] Failed to subscribe to '{}': {}", channel, e);
                    for mut handle in handles {
                        handle.unsubscribe();
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            "[Router] Installed subscriptions for '{}' (generation {})",
            names,
            generation
        );
        self.current = Some(SubscriptionSet {
            names,
            generation,
            handles,
        });
        Ok(AttachOutcome::Installed { generation })
    }

    /// Tears down the live set. Idempotent; returns whether a set existed.
    pub fn detach(&mut self) -> bool {
        match self.current.take() {
            Some(set) => {
                tracing::debug!(
                    "[Router] Detaching subscriptions for '{}' (generation {})",
                    set.names,
                    set.generation
                );
                set.dispose();
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self, generation: u64) -> bool {
        self.current
            .as_ref()
            .is_some_and(|set| set.generation == generation)
    }

    pub fn current(&self) -> Option<&SubscriptionSet> {
        self.current.as_ref()
    }

    pub fn current_names(&self) -> Option<&ChannelNames> {
        self.current.as_ref().map(SubscriptionSet::names)
    }

    pub fn live_generation(&self) -> Option<u64> {
        self.current.as_ref().map(SubscriptionSet::generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studia_core::session::{SessionScope, TurnKind};
    use studia_infrastructure::InMemoryEventBus;

    fn noop_handlers(_generation: u64) -> ChannelHandlers {
        let noop: EventHandler = Arc::new(|_| {});
        ChannelHandlers {
            content: noop.clone(),
            reasoning: noop.clone(),
            citations: noop,
        }
    }

    fn names(kind: TurnKind) -> ChannelNames {
        ChannelNames::resolve("s1", SessionScope::StudyItem, kind)
    }

    #[test]
    fn test_attach_replaces_previous_set() {
        let bus = InMemoryEventBus::new();
        let mut router = SubscriptionRouter::new(Arc::new(bus.clone()));

        let first = router.attach(names(TurnKind::First), false, noop_handlers).unwrap();
        assert_eq!(bus.total_listeners(), 3);

        let second = router
            .attach(names(TurnKind::Followup), false, noop_handlers)
            .unwrap();
        assert_eq!(bus.total_listeners(), 3);
        assert_eq!(bus.listener_count("analysis_stream_s1"), 0);
        assert_eq!(bus.listener_count("analysis_continuation_stream_s1"), 1);

        assert!(!router.is_live(first.generation()));
        assert!(router.is_live(second.generation()));
    }

    #[test]
    fn test_same_names_while_streaming_is_noop() {
        let bus = InMemoryEventBus::new();
        let mut router = SubscriptionRouter::new(Arc::new(bus.clone()));

        let installed = router.attach(names(TurnKind::First), false, noop_handlers).unwrap();
        let again = router.attach(names(TurnKind::First), true, noop_handlers).unwrap();
        assert_eq!(
            again,
            AttachOutcome::Unchanged {
                generation: installed.generation()
            }
        );

        // Not streaming: same names are re-installed under a new generation
        let reinstalled = router.attach(names(TurnKind::First), false, noop_handlers).unwrap();
        assert!(matches!(reinstalled, AttachOutcome::Installed { .. }));
        assert_ne!(reinstalled.generation(), installed.generation());
        assert_eq!(bus.total_listeners(), 3);
    }

    #[test]
    fn test_partial_failure_releases_opened_handles() {
        let bus = InMemoryEventBus::new();
        bus.reject_channel("analysis_stream_s1:rag_sources");
        let mut router = SubscriptionRouter::new(Arc::new(bus.clone()));

        let err = router
            .attach(names(TurnKind::First), false, noop_handlers)
            .unwrap_err();
        assert!(err.is_channel_attach());
        assert_eq!(bus.total_listeners(), 0);
        assert!(router.current().is_none());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let bus = InMemoryEventBus::new();
        let mut router = SubscriptionRouter::new(Arc::new(bus.clone()));
        router.attach(names(TurnKind::SideTask), false, noop_handlers).unwrap();

        assert!(router.detach());
        assert!(!router.detach());
        assert_eq!(bus.total_listeners(), 0);
        assert_eq!(router.live_generation(), None);
    }
}
