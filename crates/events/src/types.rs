//! Event types for the generation event system

use chrono::{DateTime, Utc};
use schemaforge_core::{GenerationMode, PhaseId, PhaseResult, SessionError, SlotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Position in the bus's publish order, starting at 1
    pub sequence: u64,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create an unsequenced envelope. The bus assigns the sequence on publish.
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Session lifecycle
    /// A new session was created and its pipeline is about to run
    #[serde(rename = "session.started")]
    SessionStarted {
        session_id: Uuid,
        mode: GenerationMode,
        phases: Vec<PhaseId>,
    },

    /// The session state machine applied a transition
    #[serde(rename = "session.state_changed")]
    SessionStateChanged {
        session_id: Uuid,
        /// Store revision after the transition
        revision: u64,
        transition: String,
        is_generating: bool,
        completed: usize,
        total: usize,
    },

    /// Session ended with a terminal error (including cancellation)
    #[serde(rename = "session.failed")]
    SessionFailed {
        session_id: Uuid,
        error: SessionError,
    },

    /// Every phase completed; payload is everything persistence needs
    #[serde(rename = "session.finalized")]
    SessionFinalized {
        session_id: Uuid,
        raw_phase_outputs: BTreeMap<PhaseId, PhaseResult>,
        artifacts: BTreeMap<SlotId, PhaseResult>,
    },

    /// Session discarded
    #[serde(rename = "session.reset")]
    SessionReset { session_id: Uuid },

    // Phase progress
    #[serde(rename = "phase.started")]
    PhaseStarted {
        session_id: Uuid,
        phase: PhaseId,
        index: usize,
        total: usize,
    },

    /// A retryable failure occurred and another attempt is scheduled
    #[serde(rename = "phase.retrying")]
    PhaseRetrying {
        session_id: Uuid,
        phase: PhaseId,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },

    #[serde(rename = "phase.completed")]
    PhaseCompleted {
        session_id: Uuid,
        phase: PhaseId,
        index: usize,
        total: usize,
    },

    // System events
    /// Generic error event
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// Get the session ID associated with this event, if any
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Event::SessionStarted { session_id, .. } => Some(*session_id),
            Event::SessionStateChanged { session_id, .. } => Some(*session_id),
            Event::SessionFailed { session_id, .. } => Some(*session_id),
            Event::SessionFinalized { session_id, .. } => Some(*session_id),
            Event::SessionReset { session_id } => Some(*session_id),
            Event::PhaseStarted { session_id, .. } => Some(*session_id),
            Event::PhaseRetrying { session_id, .. } => Some(*session_id),
            Event::PhaseCompleted { session_id, .. } => Some(*session_id),
            Event::Error { .. } => None,
        }
    }

    /// True for the events after which a session accepts no more changes
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::SessionFailed { .. } | Event::SessionFinalized { .. }
        )
    }
}
