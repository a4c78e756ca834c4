//! `studia replay`: drives the engine from a recorded event script.
//!
//! Each step starts a turn (or follow-up, or side task) and then publishes
//! the step's deliveries on whatever channels the engine subscribed to.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studia_application::{
    BusyState, ConversationEngine, ResyncDecision, SessionKey, SessionRegistry,
    TranscriptPersister, TurnOutcome,
};
use studia_core::config::RootConfig;
use studia_core::session::{ChatMessage, SessionScope, Transcript, TurnKind};
use studia_core::stream::{ChannelKind, ChannelPayload, GenerationTrigger, TurnInputs, TurnTicket};
use studia_infrastructure::{InMemoryEventBus, JsonSessionStore, StudiaPaths};

#[derive(Debug, Deserialize)]
pub struct ReplayScript {
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub scope: SessionScope,
    pub steps: Vec<ReplayStep>,
}

fn default_session_id() -> String {
    "replay".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReplayStep {
    Start {
        prompt: String,
        #[serde(default)]
        events: Vec<ScriptedEvent>,
    },
    Followup {
        text: String,
        #[serde(default)]
        events: Vec<ScriptedEvent>,
    },
    SideTask {
        prompt: String,
        #[serde(default)]
        events: Vec<ScriptedEvent>,
    },
    /// Publishes on the main lane without starting a turn (late deliveries).
    Deliver { events: Vec<ScriptedEvent> },
    Wait { ms: u64 },
    Cancel,
    Resync { transcript: Transcript },
}

#[derive(Debug, Deserialize)]
pub struct ScriptedEvent {
    pub channel: ChannelKind,
    #[serde(flatten)]
    pub payload: ChannelPayload,
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    session_id: String,
    busy: BusyState,
    last_outcome: Option<TurnOutcome>,
    transcript: Transcript,
    #[serde(skip_serializing_if = "Option::is_none")]
    side_task: Option<Transcript>,
    resyncs: Vec<ResyncDecision>,
}

/// Trigger for replays: the script supplies the deliveries, so starting a
/// turn only has to hand back the session id as channel seed.
struct ReplayTrigger;

#[async_trait]
impl GenerationTrigger for ReplayTrigger {
    async fn initiate_turn(
        &self,
        session_id: &str,
        turn_kind: TurnKind,
        inputs: &TurnInputs,
    ) -> studia_core::Result<TurnTicket> {
        tracing::debug!(
            "[Replay] {} turn for {}: {:?}",
            turn_kind,
            session_id,
            inputs.prompt
        );
        Ok(TurnTicket {
            channel_seed: session_id.to_string(),
        })
    }

    async fn continue_turn(
        &self,
        session_id: &str,
        history: &[ChatMessage],
    ) -> studia_core::Result<()> {
        tracing::debug!(
            "[Replay] Continuing {} with {} prior turns",
            session_id,
            history.len()
        );
        Ok(())
    }
}

pub fn load_script(path: &Path) -> Result<ReplayScript> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn run(path: &Path, config: &RootConfig, paths: &StudiaPaths, save: bool) -> Result<()> {
    let script = load_script(path)?;
    let bus = InMemoryEventBus::new();
    let registry = SessionRegistry::new(
        Arc::new(bus.clone()),
        Arc::new(ReplayTrigger),
        config.engine.clone(),
    );

    let report = execute(&registry, &bus, script).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if save {
        let store = JsonSessionStore::from_paths(paths)?;
        let engine = registry
            .get(&SessionKey::main(&report.session_id))
            .await
            .context("Main lane disappeared during replay")?;
        TranscriptPersister::new(Arc::new(store))
            .persist_now(&engine)
            .await?;
        eprintln!("Saved transcript for {}", report.session_id);
    }

    Ok(())
}

async fn execute(
    registry: &SessionRegistry,
    bus: &InMemoryEventBus,
    script: ReplayScript,
) -> Result<ReplayReport> {
    let session_id = script.session_id;
    let main = registry
        .get_or_create(SessionKey::main(&session_id), script.scope)
        .await;
    let mut side: Option<Arc<ConversationEngine>> = None;
    let mut resyncs = Vec::new();

    for (position, step) in script.steps.into_iter().enumerate() {
        let step_no = position + 1;
        match step {
            ReplayStep::Start { prompt, events } => {
                let index = main
                    .start_turn(TurnInputs::prompt(prompt))
                    .await
                    .with_context(|| format!("step {}: failed to start turn", step_no))?;
                tracing::info!("[Replay] Step {}: turn started at index {}", step_no, index);
                publish(bus, &main, events).await;
            }
            ReplayStep::Followup { text, events } => {
                let index = main
                    .send_followup(text)
                    .await
                    .with_context(|| format!("step {}: failed to send follow-up", step_no))?;
                tracing::info!("[Replay] Step {}: follow-up at index {}", step_no, index);
                publish(bus, &main, events).await;
            }
            ReplayStep::SideTask { prompt, events } => {
                let (engine, index) = registry
                    .start_side_task(&session_id, main.scope(), TurnInputs::prompt(prompt))
                    .await
                    .with_context(|| format!("step {}: failed to start side task", step_no))?;
                tracing::info!("[Replay] Step {}: side task at index {}", step_no, index);
                publish(bus, &engine, events).await;
                side = Some(engine);
            }
            ReplayStep::Deliver { events } => publish(bus, &main, events).await,
            ReplayStep::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
            ReplayStep::Cancel => {
                let cancelled = main.cancel_active_turn();
                tracing::info!("[Replay] Step {}: cancel (in flight: {})", step_no, cancelled);
            }
            ReplayStep::Resync { transcript } => {
                let decision = main.resync(transcript);
                tracing::info!("[Replay] Step {}: resync {:?}", step_no, decision);
                resyncs.push(decision);
            }
        }
    }

    Ok(ReplayReport {
        busy: main.get_busy_state(),
        last_outcome: main.last_outcome(),
        transcript: main.get_transcript(),
        side_task: side.map(|engine| engine.get_transcript()),
        session_id,
        resyncs,
    })
}

/// Publishes scripted deliveries on the engine's live channels.
async fn publish(bus: &InMemoryEventBus, engine: &ConversationEngine, events: Vec<ScriptedEvent>) {
    for event in events {
        if event.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(event.delay_ms)).await;
        }
        let Some(names) = engine.channel_names() else {
            tracing::warn!(
                "[Replay] {} has no live channels; dropping {} delivery",
                engine.session_id(),
                event.channel
            );
            continue;
        };
        bus.publish(names.name(event.channel), event.payload);
    }
}
