#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use events::{EventEnvelope, EventSubscriber};
use generator::{Generator, GeneratorError};
use orchestrator::OrchestratorConfig;
use schemaforge_core::{PhaseContext, PhaseId};

/// Generator that replays per-phase scripts. Phases without a script
/// answer `"<phase> content"`.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<PhaseId, VecDeque<generator::Result<String>>>>,
    delays: HashMap<PhaseId, Duration>,
    calls: Mutex<Vec<PhaseId>>,
    contexts: Mutex<Vec<PhaseContext>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, phase: PhaseId, text: impl Into<String>) -> Self {
        self.push(phase, Ok(text.into()))
    }

    pub fn fail(self, phase: PhaseId, error: GeneratorError) -> Self {
        self.push(phase, Err(error))
    }

    pub fn fail_times(mut self, phase: PhaseId, error: GeneratorError, times: usize) -> Self {
        for _ in 0..times {
            self = self.push(phase, Err(error.clone()));
        }
        self
    }

    pub fn delay(mut self, phase: PhaseId, delay: Duration) -> Self {
        self.delays.insert(phase, delay);
        self
    }

    fn push(self, phase: PhaseId, reply: generator::Result<String>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(phase)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<PhaseId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, phase: PhaseId) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| **p == phase).count()
    }

    pub fn context_for(&self, phase: PhaseId) -> Option<PhaseContext> {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.phase == phase)
            .cloned()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        phase: PhaseId,
        context: &PhaseContext,
        _timeout: Duration,
    ) -> generator::Result<String> {
        self.calls.lock().unwrap().push(phase);
        self.contexts.lock().unwrap().push(context.clone());

        if let Some(delay) = self.delays.get(&phase) {
            tokio::time::sleep(*delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&phase)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| Ok(format!("{} content", phase.as_str())))
    }
}

pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_base_delay(Duration::from_millis(10))
        .with_phase_timeout(Duration::from_secs(5))
}

pub fn unavailable() -> GeneratorError {
    GeneratorError::Unavailable {
        status: 503,
        message: "overloaded".to_string(),
    }
}

pub fn drain(rx: &mut EventSubscriber) -> Vec<EventEnvelope> {
    let mut out = Vec::new();
    while let Some(envelope) = rx.try_recv() {
        out.push(envelope);
    }
    out
}
