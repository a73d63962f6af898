//! Entry point for callers: start sessions, cancel them, read their state.

use std::sync::Arc;

use events::{Event, EventBus, EventSubscriber};
use generator::Generator;
use schemaforge_core::{GenerationMode, ModeConfig, PhaseResult, Session, SlotId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapter::GeneratorAdapter;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::pipeline::PhasePipelineExecutor;
use crate::progress::Progress;
use crate::retry::RetryPolicy;
use crate::state_machine::SessionEvent;
use crate::store::SessionStore;

pub struct GenerationOrchestrator {
    store: Arc<SessionStore>,
    adapter: Arc<GeneratorAdapter>,
    event_bus: EventBus,
    config: OrchestratorConfig,
}

impl GenerationOrchestrator {
    pub fn new(generator: Arc<dyn Generator>, config: OrchestratorConfig) -> Self {
        let event_bus = EventBus::new();
        let adapter = GeneratorAdapter::new(
            generator,
            RetryPolicy::from_config(&config.retry),
            config.phase_timeout(),
        )
        .with_event_bus(event_bus.clone());

        Self {
            store: Arc::new(SessionStore::new(event_bus.clone())),
            adapter: Arc::new(adapter),
            event_bus,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn get_session(&self) -> Option<Session> {
        self.store.get_session()
    }

    pub fn get_slot_content(&self, slot: SlotId) -> Option<PhaseResult> {
        self.store.get_slot_content(slot)
    }

    pub fn get_progress(&self) -> Progress {
        self.store.get_progress()
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.store.subscribe()
    }

    pub fn start(&self, mode: GenerationMode, request: impl Into<String>) -> Result<SessionHandle> {
        self.start_with(ModeConfig::for_mode(mode), request)
    }

    /// Start a session for an explicit mode table. The table and the
    /// orchestrator settings are validated before anything is dispatched.
    pub fn start_with(&self, config: ModeConfig, request: impl Into<String>) -> Result<SessionHandle> {
        self.config.validate()?;
        config.validate()?;
        let request = request.into();

        let session = self
            .store
            .begin(SessionEvent::started(&config, request.clone()))?;
        let session_id = session.id;

        info!(
            session_id = %session_id,
            mode = %config.mode,
            phases = session.phases.len(),
            "Generation session started"
        );
        self.event_bus.publish(Event::SessionStarted {
            session_id,
            mode: config.mode,
            phases: session.phases.clone(),
        });

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut pipeline = PhasePipelineExecutor::new(
            session_id,
            config,
            request,
            Arc::clone(&self.adapter),
            Arc::clone(&self.store),
        );
        let join = tokio::spawn(async move { pipeline.run(&token).await });

        Ok(SessionHandle {
            session_id,
            cancel,
            join,
            store: Arc::clone(&self.store),
        })
    }

    /// Start a session and wait for it to reach a terminal state.
    pub async fn run(&self, mode: GenerationMode, request: impl Into<String>) -> Result<Session> {
        self.start(mode, request)?.wait().await
    }

    pub fn reset(&self) -> Result<()> {
        self.store.reset()
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    session_id: Uuid,
    cancel: CancellationToken,
    join: JoinHandle<Result<()>>,
    store: Arc<SessionStore>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Stop before the next phase and abandon the in-flight call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the pipeline and return the terminal session. Phase
    /// failures are recorded on the session, not returned here.
    pub async fn wait(self) -> Result<Session> {
        match self.join.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(session_id = %self.session_id, kind = %e.kind(), "Session ended with error");
            }
            Err(e) => return Err(OrchestratorError::Join(e.to_string())),
        }

        self.store
            .get_session()
            .filter(|s| s.id == self.session_id)
            .ok_or(OrchestratorError::NoActiveSession)
    }
}
