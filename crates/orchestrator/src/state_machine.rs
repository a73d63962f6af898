//! Session reducer.
//!
//! `SessionStateMachine::apply` is the only function that produces new
//! `Session` values. It is pure: every timestamp and id it needs is
//! carried by the event, so replaying a recorded event list yields the
//! same sessions.

use chrono::{DateTime, Utc};
use schemaforge_core::{LogEntry, ModeConfig, PhaseId, PhaseResult, Session, SessionError};
use uuid::Uuid;

use crate::merger::ContentMerger;

const SESSION_SOURCE: &str = "session";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionStarted {
        session_id: Uuid,
        config: ModeConfig,
        request: String,
        at: DateTime<Utc>,
    },
    /// Narration only.
    PhaseStarted { phase: PhaseId, at: DateTime<Utc> },
    PhaseCompleted { result: PhaseResult, at: DateTime<Utc> },
    FatalError { error: SessionError, at: DateTime<Utc> },
    SessionReset,
}

impl SessionEvent {
    pub fn started(config: &ModeConfig, request: impl Into<String>) -> Self {
        Self::SessionStarted {
            session_id: Uuid::new_v4(),
            config: config.clone(),
            request: request.into(),
            at: Utc::now(),
        }
    }

    pub fn phase_started(phase: PhaseId) -> Self {
        Self::PhaseStarted {
            phase,
            at: Utc::now(),
        }
    }

    pub fn phase_completed(result: PhaseResult) -> Self {
        Self::PhaseCompleted {
            result,
            at: Utc::now(),
        }
    }

    pub fn fatal_error(error: SessionError) -> Self {
        Self::FatalError {
            error,
            at: Utc::now(),
        }
    }

    pub fn reset() -> Self {
        Self::SessionReset
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::PhaseStarted { .. } => "phase_started",
            Self::PhaseCompleted { .. } => "phase_completed",
            Self::FatalError { .. } => "fatal_error",
            Self::SessionReset => "session_reset",
        }
    }
}

pub struct SessionStateMachine;

impl SessionStateMachine {
    /// Apply one event. Events that do not fit the current state (a second
    /// start, anything but reset after the session is terminal, a phase
    /// outside the session's list) return the session unchanged.
    pub fn apply(session: Option<Session>, event: &SessionEvent) -> Option<Session> {
        match event {
            SessionEvent::SessionStarted {
                session_id,
                config,
                request,
                at,
            } => {
                if session.is_some() {
                    return session;
                }
                let mut fresh = Session::new(*session_id, config, request.clone(), *at);
                fresh.log.push(LogEntry::new(
                    *at,
                    SESSION_SOURCE,
                    format!(
                        "Started {} generation with {} phases",
                        config.mode,
                        fresh.phases.len()
                    ),
                ));
                Some(fresh)
            }
            SessionEvent::SessionReset => None,
            SessionEvent::PhaseStarted { phase, at } => session.map(|s| Self::phase_started(s, *phase, *at)),
            SessionEvent::PhaseCompleted { result, at } => {
                session.map(|s| Self::phase_completed(s, result, *at))
            }
            SessionEvent::FatalError { error, at } => session.map(|s| Self::fatal_error(s, error, *at)),
        }
    }

    /// Fold a list of events starting from no session.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a SessionEvent>) -> Option<Session> {
        events.into_iter().fold(None, Self::apply)
    }

    fn phase_started(mut session: Session, phase: PhaseId, at: DateTime<Utc>) -> Session {
        if session.is_terminal() || !session.phases.contains(&phase) {
            return session;
        }
        session
            .log
            .push(LogEntry::new(at, phase.as_str(), format!("Starting {}", phase.title())));
        session
    }

    fn phase_completed(mut session: Session, result: &PhaseResult, at: DateTime<Utc>) -> Session {
        let phase = result.phase;
        if session.is_terminal() || !session.phases.contains(&phase) {
            return session;
        }

        session.raw_phase_outputs.insert(phase, result.clone());
        if result.is_completed() {
            session.completed_phases.insert(phase);
        } else {
            session.completed_phases.remove(&phase);
        }

        let affected: Vec<_> = ContentMerger::affected_slots(&session.slot_rules, phase)
            .cloned()
            .collect();
        for rule in affected {
            match ContentMerger::merge_slot(&session.raw_phase_outputs, &rule) {
                Some(merged) => {
                    session.artifacts.insert(rule.slot, merged);
                }
                None => {
                    session.artifacts.remove(&rule.slot);
                }
            }
        }

        let message = if result.is_completed() {
            format!("Completed {}", result.title)
        } else {
            format!("{} produced no usable output", result.title)
        };
        session.log.push(LogEntry::new(at, phase.as_str(), message));

        if session.all_phases_completed() {
            session.is_generating = false;
            session.finished_at = Some(at);
            session.log.push(LogEntry::new(
                at,
                SESSION_SOURCE,
                format!("All {} phases completed", session.phases.len()),
            ));
        }

        session
    }

    fn fatal_error(mut session: Session, error: &SessionError, at: DateTime<Utc>) -> Session {
        if session.is_terminal() {
            return session;
        }
        session.error = Some(error.clone());
        session.is_generating = false;
        session.finished_at = Some(at);
        let source = error.phase.map(|p| p.as_str()).unwrap_or(SESSION_SOURCE);
        session
            .log
            .push(LogEntry::new(at, source, format!("Generation stopped: {}", error)));
        session
    }
}
