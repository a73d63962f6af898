use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use super::mode::{GenerationMode, ModeConfig, SlotId, SlotRule};
use super::phase::{PhaseId, PhaseResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected or malformed request, auth or generator configuration problem.
    Fatal,
    RetryExhausted,
    Cancelled,
    /// Invalid mode table or orchestrator setup.
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::RetryExhausted => "retry_exhausted",
            Self::Cancelled => "cancelled",
            Self::Configuration => "configuration",
        }
    }

    /// Cancellation ends a session but is not an operational failure.
    pub fn is_operational_failure(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error recorded on a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
    pub phase: Option<PhaseId>,
    pub attempts: Option<u32>,
}

impl SessionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            phase: None,
            attempts: None,
        }
    }

    pub fn cancelled(phase: Option<PhaseId>) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            message: "Generation cancelled".to_string(),
            phase,
            attempts: None,
        }
    }

    pub fn with_phase(mut self, phase: PhaseId) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            Some(phase) => write!(f, "[{}] {}: {}", self.kind, phase, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// One narration line. Never read for control decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Phase or agent label the entry originates from.
    pub source: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            source: source.into(),
            message: message.into(),
        }
    }
}

/// Root aggregate of one generation run.
///
/// Only the orchestrator's state machine produces new `Session` values;
/// everything else reads snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Session {
    pub id: Uuid,
    pub mode: GenerationMode,
    pub request: String,
    pub phases: Vec<PhaseId>,
    pub slot_rules: Vec<SlotRule>,
    pub completed_phases: BTreeSet<PhaseId>,
    pub artifacts: BTreeMap<SlotId, PhaseResult>,
    pub raw_phase_outputs: BTreeMap<PhaseId, PhaseResult>,
    pub is_generating: bool,
    pub error: Option<SessionError>,
    pub log: Vec<LogEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        id: Uuid,
        config: &ModeConfig,
        request: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            mode: config.mode,
            request: request.into(),
            phases: config.phase_ids(),
            slot_rules: config.slot_rules.clone(),
            completed_phases: BTreeSet::new(),
            artifacts: BTreeMap::new(),
            raw_phase_outputs: BTreeMap::new(),
            is_generating: true,
            error: None,
            log: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_generating
    }

    pub fn all_phases_completed(&self) -> bool {
        self.phases.iter().all(|p| self.completed_phases.contains(p))
    }

    /// Terminal without error.
    pub fn is_completed(&self) -> bool {
        self.is_terminal() && self.error.is_none() && self.all_phases_completed()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn slot(&self, slot: SlotId) -> Option<&PhaseResult> {
        self.artifacts.get(&slot)
    }

    pub fn phase_output(&self, phase: PhaseId) -> Option<&PhaseResult> {
        self.raw_phase_outputs.get(&phase)
    }

    pub fn pending_phases(&self) -> impl Iterator<Item = PhaseId> + '_ {
        self.phases
            .iter()
            .copied()
            .filter(|p| !self.completed_phases.contains(p))
    }
}
