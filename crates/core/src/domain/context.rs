use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::mode::GenerationMode;
use super::phase::{PhaseContent, PhaseId, PhaseResult};

/// Output of an earlier phase carried into a later phase's context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorOutput {
    pub phase: PhaseId,
    pub title: String,
    pub content: PhaseContent,
}

/// Input handed to the generator for one phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseContext {
    pub session_id: Uuid,
    pub mode: GenerationMode,
    pub phase: PhaseId,
    /// The user's original description of the database to design.
    pub request: String,
    /// Outputs of the phases this one depends on, in pipeline order.
    pub prior: Vec<PriorOutput>,
}

impl PhaseContext {
    pub fn new(
        session_id: Uuid,
        mode: GenerationMode,
        phase: PhaseId,
        request: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            mode,
            phase,
            request: request.into(),
            prior: Vec::new(),
        }
    }

    pub fn with_prior(mut self, result: &PhaseResult) -> Self {
        self.prior.push(PriorOutput {
            phase: result.phase,
            title: result.title.clone(),
            content: result.content.clone(),
        });
        self
    }

    pub fn prior_output(&self, phase: PhaseId) -> Option<&PriorOutput> {
        self.prior.iter().find(|p| p.phase == phase)
    }

    /// JSON payload sent to the generator.
    pub fn to_payload(&self) -> serde_json::Value {
        let prior: serde_json::Map<String, serde_json::Value> = self
            .prior
            .iter()
            .map(|p| {
                let value = match &p.content {
                    PhaseContent::Structured(value) => value.clone(),
                    other => serde_json::Value::String(other.render()),
                };
                (p.phase.as_str().to_string(), value)
            })
            .collect();

        json!({
            "session_id": self.session_id,
            "mode": self.mode.as_str(),
            "phase": self.phase.as_str(),
            "request": self.request,
            "prior": prior,
        })
    }
}
