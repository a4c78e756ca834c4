//! Conversation engine for one session lane.
//!
//! Ties the transcript, the subscription router, the reconciler, the
//! protection policy and the timeout supervisor together behind one lock.
//! Bus callbacks hold only a weak reference plus the subscription generation
//! they were built for, so a torn-down engine or a replaced subscription set
//! turns late deliveries into no-ops.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use studia_core::config::EngineConfig;
use studia_core::error::{Result, StudiaError};
use studia_core::session::{ChatMessage, SessionLane, SessionScope, Transcript, TurnKind};
use studia_core::stream::{
    ChannelKind, ChannelNames, ChannelPayload, EventBus, EventHandler, GenerationTrigger,
    TurnInputs,
};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::stream::{
    BusyState, ChannelHandlers, EngineEvent, EventDisposition, ProtectionPolicy, ResyncDecision,
    StreamReconciler, StreamState, SubscriptionRouter, TimeoutSupervisor, TurnOutcome, TurnPhase,
};

struct SessionContext {
    stream: StreamState,
    turn_kind: Option<TurnKind>,
    router: SubscriptionRouter,
    supervisor: TimeoutSupervisor,
}

struct EngineShared {
    session_id: String,
    scope: SessionScope,
    lane: SessionLane,
    reconciler: StreamReconciler,
    policy: ProtectionPolicy,
    trigger: Arc<dyn GenerationTrigger>,
    context: Mutex<SessionContext>,
    events: broadcast::Sender<EngineEvent>,
    busy: watch::Sender<BusyState>,
}

/// Streaming conversation state for one `(session, lane)` pair.
///
/// All mutation happens under one internal lock; nothing is held across an
/// await point.
pub struct ConversationEngine {
    shared: Arc<EngineShared>,
}

impl ConversationEngine {
    pub fn new(
        session_id: impl Into<String>,
        scope: SessionScope,
        lane: SessionLane,
        bus: Arc<dyn EventBus>,
        trigger: Arc<dyn GenerationTrigger>,
        config: &EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (busy, _) = watch::channel(BusyState::default());

        let context = SessionContext {
            stream: StreamState::new(Transcript::new(), config.dedup_prefix_chars),
            turn_kind: None,
            router: SubscriptionRouter::new(bus),
            supervisor: TimeoutSupervisor::new(config.stream_timeout()),
        };

        Self {
            shared: Arc::new(EngineShared {
                session_id: session_id.into(),
                scope,
                lane,
                reconciler: StreamReconciler::new(config.completion_override_ratio),
                policy: ProtectionPolicy::new(config.protection_window()),
                trigger,
                context: Mutex::new(context),
                events,
                busy,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn scope(&self) -> SessionScope {
        self.shared.scope
    }

    pub fn lane(&self) -> SessionLane {
        self.shared.lane
    }

    /// Starts a generated turn.
    ///
    /// The turn kind is derived from the transcript and lane. Subscriptions
    /// are installed and the timeout is armed before the backend is asked to
    /// generate, so no delivery can be missed. Returns the index of the new
    /// assistant turn.
    pub async fn start_turn(&self, inputs: TurnInputs) -> Result<usize> {
        let shared = &self.shared;
        let (index, turn_id, turn_kind) = {
            let mut ctx = shared.lock();
            shared.ensure_idle(&ctx)?;
            let turn_kind = TurnKind::classify(&ctx.stream.transcript, shared.lane);
            let (index, turn_id) = shared.begin_turn(&mut ctx, turn_kind)?;
            (index, turn_id, turn_kind)
        };

        let ticket = match shared
            .trigger
            .initiate_turn(&shared.session_id, turn_kind, &inputs)
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                shared.fail_turn(turn_id, &e);
                return Err(e);
            }
        };

        if ticket.channel_seed != shared.session_id {
            shared.reseed(turn_id, turn_kind, &ticket.channel_seed)?;
        }
        Ok(index)
    }

    /// Appends a user turn and continues the conversation.
    ///
    /// The user turn stays in the transcript even when the continuation
    /// cannot be started.
    pub async fn send_followup(&self, text: impl Into<String>) -> Result<usize> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(StudiaError::invalid_state("follow-up text is empty"));
        }

        let shared = &self.shared;
        let (index, turn_id, history) = {
            let mut ctx = shared.lock();
            shared.ensure_idle(&ctx)?;
            if shared.lane == SessionLane::SideTask {
                return Err(StudiaError::invalid_state(
                    "side-task lanes do not accept follow-ups",
                ));
            }

            ctx.stream.transcript.push(ChatMessage::user(text));
            let turn_kind = TurnKind::classify(&ctx.stream.transcript, shared.lane);
            let (index, turn_id) = shared.begin_turn(&mut ctx, turn_kind)?;
            let history = ctx.stream.transcript.messages()[..index].to_vec();
            (index, turn_id, history)
        };

        if let Err(e) = shared
            .trigger
            .continue_turn(&shared.session_id, &history)
            .await
        {
            shared.fail_turn(turn_id, &e);
            return Err(e);
        }
        Ok(index)
    }

    /// Cancels the in-flight turn, keeping any partial content.
    ///
    /// Returns `false` when no turn was in flight.
    pub fn cancel_active_turn(&self) -> bool {
        let mut ctx = self.shared.lock();
        if ctx.stream.is_idle() {
            return false;
        }
        tracing::info!(
            "[Engine] Cancelling turn {} of session {}",
            ctx.stream.turn_id,
            self.shared.session_id
        );
        self.shared.finish_turn(&mut ctx, TurnOutcome::Cancelled);
        true
    }

    /// Offers an externally held transcript (e.g. reloaded from storage).
    ///
    /// Local state wins unless the protection policy accepts the external
    /// copy.
    pub fn resync(&self, external: Transcript) -> ResyncDecision {
        let shared = &self.shared;
        let mut ctx = shared.lock();
        let (messages, reasoning) = external.into_parts();

        let decision = shared.policy.evaluate(
            ctx.stream.transcript.messages(),
            &messages,
            !ctx.stream.is_idle(),
            ctx.stream.completed_at,
            Instant::now(),
        );

        match decision {
            ResyncDecision::Accept(reason) => {
                let turns = messages.len();
                ctx.stream.transcript.replace_all(messages, reasoning);
                tracing::info!(
                    "[Engine] Resync accepted for session {} ({:?}, {} turns)",
                    shared.session_id,
                    reason,
                    turns
                );
                shared.emit(EngineEvent::ResyncApplied {
                    session_id: shared.session_id.clone(),
                    turns,
                });
            }
            ResyncDecision::Reject(reason) => {
                tracing::debug!(
                    "[Engine] Resync rejected for session {}: {:?}",
                    shared.session_id,
                    reason
                );
                shared.emit(EngineEvent::ResyncRejected {
                    session_id: shared.session_id.clone(),
                    reason,
                });
            }
        }
        decision
    }

    /// Delivers a payload to the live subscription set as if it came from
    /// the bus. Returns `Stale` when nothing is attached.
    pub fn deliver(&self, kind: ChannelKind, payload: ChannelPayload) -> EventDisposition {
        let mut ctx = self.shared.lock();
        match ctx.router.live_generation() {
            Some(_) => self.shared.apply_locked(&mut ctx, kind, &payload),
            None => EventDisposition::Stale,
        }
    }

    /// Releases subscriptions and timers. An in-flight turn is cancelled.
    pub fn detach(&self) {
        let mut ctx = self.shared.lock();
        if ctx.stream.is_idle() {
            ctx.supervisor.disarm();
            if ctx.router.detach() {
                tracing::debug!("[Engine] Detached session {}", self.shared.session_id);
            }
        } else {
            self.shared.finish_turn(&mut ctx, TurnOutcome::Cancelled);
        }
    }

    pub fn get_transcript(&self) -> Transcript {
        self.shared.lock().stream.transcript.clone()
    }

    pub fn get_busy_state(&self) -> BusyState {
        self.shared.lock().stream.busy_state()
    }

    pub fn phase(&self) -> TurnPhase {
        self.shared.lock().stream.phase
    }

    pub fn last_outcome(&self) -> Option<TurnOutcome> {
        self.shared.lock().stream.last_outcome
    }

    /// Kind of the most recently started turn.
    pub fn turn_kind(&self) -> Option<TurnKind> {
        self.shared.lock().turn_kind
    }

    /// Names of the live subscription set, if any.
    pub fn channel_names(&self) -> Option<ChannelNames> {
        self.shared.lock().router.current_names().cloned()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    pub fn watch_busy(&self) -> watch::Receiver<BusyState> {
        self.shared.busy.subscribe()
    }
}

impl Drop for ConversationEngine {
    fn drop(&mut self) {
        let mut ctx = self.shared.lock();
        ctx.supervisor.disarm();
        ctx.router.detach();
    }
}

impl EngineShared {
    fn lock(&self) -> MutexGuard<'_, SessionContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: EngineEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn publish_busy(&self, ctx: &SessionContext) {
        self.busy.send_replace(ctx.stream.busy_state());
    }

    fn ensure_idle(&self, ctx: &SessionContext) -> Result<()> {
        if ctx.stream.is_idle() {
            Ok(())
        } else {
            Err(StudiaError::invalid_state(format!(
                "a turn is already in flight for session {}",
                self.session_id
            )))
        }
    }

    /// Attaches listeners, appends the assistant placeholder and arms the
    /// timer. On attach failure the lane stays idle and nothing is appended.
    fn begin_turn(
        self: &Arc<Self>,
        ctx: &mut SessionContext,
        turn_kind: TurnKind,
    ) -> Result<(usize, u64)> {
        let names = ChannelNames::resolve(&self.session_id, self.scope, turn_kind);
        if let Err(e) = self.attach(ctx, names.clone()) {
            tracing::error!(
                "[Engine] Failed to attach channels for session {}: {}",
                self.session_id,
                e
            );
            self.publish_busy(ctx);
            self.emit(EngineEvent::TurnErrored {
                session_id: self.session_id.clone(),
                error: e.clone(),
            });
            return Err(e);
        }

        let index = ctx.stream.transcript.push(ChatMessage::assistant(""));
        let turn_id = ctx.stream.begin(index);
        ctx.turn_kind = Some(turn_kind);

        let weak = Arc::downgrade(self);
        let armed = ctx.supervisor.arm(turn_id, move |fired| {
            if let Some(shared) = weak.upgrade() {
                shared.on_timeout(fired);
            }
        });
        if let Err(e) = armed {
            self.finish_turn(ctx, TurnOutcome::Errored);
            self.emit(EngineEvent::TurnErrored {
                session_id: self.session_id.clone(),
                error: e.clone(),
            });
            return Err(e);
        }

        tracing::info!(
            "[Engine] Started {} turn {} for session {} at index {} on '{}'",
            turn_kind,
            turn_id,
            self.session_id,
            index,
            names
        );
        self.publish_busy(ctx);
        self.emit(EngineEvent::TurnStarted {
            session_id: self.session_id.clone(),
            turn_kind,
            index,
            channels: names,
        });
        Ok((index, turn_id))
    }

    fn attach(self: &Arc<Self>, ctx: &mut SessionContext, names: ChannelNames) -> Result<()> {
        let weak = Arc::downgrade(self);
        let turn_active = !ctx.stream.is_idle();
        ctx.router
            .attach(names, turn_active, |generation| {
                channel_handlers(weak, generation)
            })
            .map(|_| ())
    }

    /// The backend announced a channel seed other than the session id.
    fn reseed(self: &Arc<Self>, turn_id: u64, turn_kind: TurnKind, seed: &str) -> Result<()> {
        let mut ctx = self.lock();
        if ctx.stream.turn_id != turn_id || ctx.stream.is_idle() {
            return Ok(());
        }

        let names = ChannelNames::resolve(seed, self.scope, turn_kind);
        tracing::info!(
            "[Engine] Backend seeded session {} with '{}'; re-attaching to '{}'",
            self.session_id,
            seed,
            names
        );
        if let Err(e) = self.attach(&mut ctx, names) {
            self.finish_turn(&mut ctx, TurnOutcome::Errored);
            self.emit(EngineEvent::TurnErrored {
                session_id: self.session_id.clone(),
                error: e.clone(),
            });
            return Err(e);
        }
        Ok(())
    }

    fn on_channel_event(&self, generation: u64, kind: ChannelKind, payload: ChannelPayload) {
        let mut ctx = self.lock();
        if !ctx.router.is_live(generation) {
            tracing::trace!(
                "[Engine] Ignoring {} delivery from retired generation {}",
                kind,
                generation
            );
            return;
        }
        self.apply_locked(&mut ctx, kind, &payload);
    }

    fn apply_locked(
        &self,
        ctx: &mut SessionContext,
        kind: ChannelKind,
        payload: &ChannelPayload,
    ) -> EventDisposition {
        let Some(channel) = ctx.router.current_names().map(|n| n.name(kind).to_string()) else {
            return EventDisposition::Stale;
        };

        let disposition =
            self.reconciler
                .apply(&mut ctx.stream, kind, &channel, payload, Instant::now());
        if disposition.is_content_activity() {
            ctx.supervisor.disarm();
        }

        match &disposition {
            EventDisposition::ChunkApplied { index, first_event } => {
                if *first_event {
                    tracing::debug!(
                        "[Engine] First content event for session {} (turn {})",
                        self.session_id,
                        ctx.stream.turn_id
                    );
                    self.publish_busy(ctx);
                }
                let length = ctx.stream.transcript.content_at(*index).map_or(0, str::len);
                self.emit(EngineEvent::ContentUpdated {
                    session_id: self.session_id.clone(),
                    index: *index,
                    length,
                });
            }
            EventDisposition::TurnCompleted {
                index,
                used_payload,
            } => {
                tracing::info!(
                    "[Engine] Turn {} of session {} completed at index {}{}",
                    ctx.stream.turn_id,
                    self.session_id,
                    index,
                    if *used_payload {
                        " (completion snapshot)"
                    } else {
                        ""
                    }
                );
                self.publish_busy(ctx);
                self.emit(EngineEvent::TurnFinalized {
                    session_id: self.session_id.clone(),
                    index: Some(*index),
                    outcome: TurnOutcome::Completed,
                });
            }
            EventDisposition::ReasoningApplied { resolution, .. } => {
                if resolution.is_fallback() {
                    tracing::debug!(
                        "[Engine] Reasoning for session {} placed by fallback at index {}",
                        self.session_id,
                        resolution.index()
                    );
                }
                self.emit(EngineEvent::ReasoningUpdated {
                    session_id: self.session_id.clone(),
                    index: resolution.index(),
                    fallback: resolution.is_fallback(),
                });
            }
            EventDisposition::CitationsApplied { index, count } => {
                self.emit(EngineEvent::CitationsAttached {
                    session_id: self.session_id.clone(),
                    index: *index,
                    count: *count,
                });
            }
            EventDisposition::DuplicateIgnored => {
                tracing::trace!("[Engine] Duplicate delivery on '{}'", channel);
            }
            EventDisposition::Stale => {
                tracing::debug!(
                    "[Engine] Content on '{}' with no turn in flight; ignored",
                    channel
                );
            }
            EventDisposition::Dropped { reason } => {
                tracing::warn!("[Engine] Dropped delivery on '{}': {}", channel, reason);
            }
        }
        disposition
    }

    fn on_timeout(&self, turn_id: u64) {
        let mut ctx = self.lock();
        if ctx.stream.turn_id != turn_id || ctx.stream.phase != TurnPhase::AwaitingFirstEvent {
            return;
        }

        tracing::warn!(
            "[Engine] No content for turn {} of session {} within timeout",
            turn_id,
            self.session_id
        );
        self.emit(EngineEvent::StreamStalled {
            session_id: self.session_id.clone(),
            error: StudiaError::stream_stalled(&self.session_id),
        });
        self.finish_turn(&mut ctx, TurnOutcome::TimedOut);
    }

    fn fail_turn(&self, turn_id: u64, error: &StudiaError) {
        let mut ctx = self.lock();
        if ctx.stream.turn_id != turn_id || ctx.stream.is_idle() {
            return;
        }

        tracing::error!(
            "[Engine] Generation failed for session {}: {}",
            self.session_id,
            error
        );
        self.emit(EngineEvent::TurnErrored {
            session_id: self.session_id.clone(),
            error: error.clone(),
        });
        self.finish_turn(&mut ctx, TurnOutcome::Errored);
    }

    /// Non-completion terminal path: finalize with partial content and
    /// release subscriptions and timers.
    fn finish_turn(&self, ctx: &mut SessionContext, outcome: TurnOutcome) -> Option<usize> {
        let index = ctx.stream.finalize(outcome, Instant::now());
        ctx.supervisor.disarm();
        ctx.router.detach();
        self.publish_busy(ctx);
        self.emit(EngineEvent::TurnFinalized {
            session_id: self.session_id.clone(),
            index,
            outcome,
        });
        index
    }
}

fn channel_handlers(weak: Weak<EngineShared>, generation: u64) -> ChannelHandlers {
    let handler = |kind: ChannelKind| -> EventHandler {
        let weak = weak.clone();
        Arc::new(move |payload: ChannelPayload| {
            if let Some(shared) = weak.upgrade() {
                shared.on_channel_event(generation, kind, payload);
            }
        })
    };

    ChannelHandlers {
        content: handler(ChannelKind::Content),
        reasoning: handler(ChannelKind::Reasoning),
        citations: handler(ChannelKind::Citations),
    }
}
