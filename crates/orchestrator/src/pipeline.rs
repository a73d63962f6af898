//! Sequential phase execution for one session.

use std::collections::BTreeMap;
use std::sync::Arc;

use events::{Event, EventBus};
use schemaforge_core::{ErrorKind, ModeConfig, PhaseContext, PhaseId, PhaseResult, SessionError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapter::GeneratorAdapter;
use crate::error::{OrchestratorError, Result};
use crate::state_machine::SessionEvent;
use crate::store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running(usize),
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Records a fatal error if the pipeline stops without reaching a
/// terminal state (panic, aborted task).
struct PipelineGuard {
    session_id: Uuid,
    store: Arc<SessionStore>,
    finished: bool,
}

impl PipelineGuard {
    fn new(session_id: Uuid, store: Arc<SessionStore>) -> Self {
        Self {
            session_id,
            store,
            finished: false,
        }
    }

    fn mark_finished(&mut self) {
        self.finished = true;
    }
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        error!(session_id = %self.session_id, "Pipeline dropped before finishing");
        self.store.event_bus().publish(Event::Error {
            message: "Pipeline stopped unexpectedly".to_string(),
            context: Some(self.session_id.to_string()),
        });
        self.store.dispatch(SessionEvent::fatal_error(SessionError::new(
            ErrorKind::Fatal,
            "Pipeline stopped unexpectedly",
        )));
    }
}

pub struct PhasePipelineExecutor {
    session_id: Uuid,
    config: ModeConfig,
    request: String,
    adapter: Arc<GeneratorAdapter>,
    store: Arc<SessionStore>,
    event_bus: EventBus,
    state: PipelineState,
}

impl PhasePipelineExecutor {
    pub fn new(
        session_id: Uuid,
        config: ModeConfig,
        request: impl Into<String>,
        adapter: Arc<GeneratorAdapter>,
        store: Arc<SessionStore>,
    ) -> Self {
        let event_bus = store.event_bus().clone();
        Self {
            session_id,
            config,
            request: request.into(),
            adapter,
            store,
            event_bus,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run every phase in order. Stops at the first failure or when
    /// `cancel` fires; either way the session receives one `fatalError`.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.state != PipelineState::Idle {
            return Err(OrchestratorError::ExecutionFailed(
                "pipeline has already run".to_string(),
            ));
        }

        let mut guard = PipelineGuard::new(self.session_id, Arc::clone(&self.store));
        let outcome = self.run_phases(cancel).await;

        match &outcome {
            Ok(()) => {
                self.state = PipelineState::Completed;
                info!(session_id = %self.session_id, "Pipeline completed");
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                warn!(session_id = %self.session_id, error = %e, "Pipeline failed");
                self.store
                    .dispatch(SessionEvent::fatal_error(e.to_session_error()));
            }
        }

        guard.mark_finished();
        outcome
    }

    async fn run_phases(&mut self, cancel: &CancellationToken) -> Result<()> {
        let total = self.config.phases.len();
        let mut outputs: BTreeMap<PhaseId, PhaseResult> = BTreeMap::new();
        let phases = self.config.phases.clone();

        for (index, spec) in phases.iter().enumerate() {
            let phase = spec.id;
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled { phase: Some(phase) });
            }

            self.state = PipelineState::Running(index);
            info!(session_id = %self.session_id, phase = %phase, index, total, "Starting phase");
            self.store.dispatch(SessionEvent::phase_started(phase));
            self.event_bus.publish(Event::PhaseStarted {
                session_id: self.session_id,
                phase,
                index,
                total,
            });

            let context = spec
                .depends_on
                .iter()
                .filter_map(|dep| outputs.get(dep))
                .fold(
                    PhaseContext::new(self.session_id, self.config.mode, phase, self.request.clone()),
                    |ctx, prior| ctx.with_prior(prior),
                );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(OrchestratorError::Cancelled { phase: Some(phase) }),
                result = self.adapter.run(phase, &context) => result,
            }?;

            outputs.insert(phase, result.clone());
            self.store.dispatch(SessionEvent::phase_completed(result));
            self.event_bus.publish(Event::PhaseCompleted {
                session_id: self.session_id,
                phase,
                index,
                total,
            });
        }

        Ok(())
    }
}
