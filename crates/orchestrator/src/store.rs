//! Single-writer session store.
//!
//! The current session lives behind one lock. `dispatch` runs the reducer
//! and publishes the resulting bus events while still holding the write
//! lock, so subscribers observe transitions in the order they were applied.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use events::{Event, EventBus, EventSubscriber};
use schemaforge_core::{PhaseResult, Session, SlotId};
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::progress::{Progress, ProgressAggregator};
use crate::state_machine::{SessionEvent, SessionStateMachine};

#[derive(Default)]
struct StoreState {
    session: Option<Session>,
    revision: u64,
}

pub struct SessionStore {
    state: RwLock<StoreState>,
    event_bus: EventBus,
}

impl SessionStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            event_bus,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `event` and return the resulting snapshot.
    pub fn dispatch(&self, event: SessionEvent) -> Option<Session> {
        let mut state = self.write();
        self.apply_locked(&mut state, &event);
        state.session.clone()
    }

    /// Start a new session. A terminal session is discarded first; a
    /// session that is still generating is refused.
    pub fn begin(&self, event: SessionEvent) -> Result<Session> {
        let mut state = self.write();

        if let Some(current) = &state.session {
            if current.is_generating {
                return Err(OrchestratorError::SessionInFlight(current.id));
            }
            self.apply_locked(&mut state, &SessionEvent::reset());
        }

        self.apply_locked(&mut state, &event);
        state
            .session
            .clone()
            .ok_or_else(|| OrchestratorError::ExecutionFailed("session did not start".to_string()))
    }

    /// Discard the current session. Refused while it is generating.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.write();
        match &state.session {
            None => Err(OrchestratorError::NoActiveSession),
            Some(current) if current.is_generating => {
                Err(OrchestratorError::SessionInFlight(current.id))
            }
            Some(_) => {
                self.apply_locked(&mut state, &SessionEvent::reset());
                Ok(())
            }
        }
    }

    fn apply_locked(&self, state: &mut StoreState, event: &SessionEvent) {
        let previous = state.session.take();
        let next = SessionStateMachine::apply(previous.clone(), event);

        if next == previous {
            debug!(transition = event.name(), "Event did not change the session");
            state.session = next;
            return;
        }

        state.revision += 1;
        let revision = state.revision;

        match (&previous, &next) {
            (Some(old), None) => {
                info!(session_id = %old.id, revision, "Session reset");
                self.publish_state_changed(old, revision, event, false);
                self.event_bus.publish(Event::SessionReset { session_id: old.id });
            }
            (_, Some(session)) => {
                self.publish_state_changed(session, revision, event, session.is_generating);

                let was_generating = previous.as_ref().map_or(false, |s| s.is_generating);
                if was_generating && session.is_terminal() {
                    self.publish_terminal(session);
                }
            }
            (None, None) => {}
        }

        state.session = next;
    }

    fn publish_state_changed(&self, session: &Session, revision: u64, event: &SessionEvent, is_generating: bool) {
        self.event_bus.publish(Event::SessionStateChanged {
            session_id: session.id,
            revision,
            transition: event.name().to_string(),
            is_generating,
            completed: session.completed_phases.len(),
            total: session.phases.len(),
        });
    }

    fn publish_terminal(&self, session: &Session) {
        match &session.error {
            Some(error) => {
                warn!(session_id = %session.id, error = %error, "Session failed");
                self.event_bus.publish(Event::SessionFailed {
                    session_id: session.id,
                    error: error.clone(),
                });
            }
            None => {
                info!(
                    session_id = %session.id,
                    artifacts = session.artifacts.len(),
                    "Session completed, finalizing"
                );
                self.event_bus.publish(Event::SessionFinalized {
                    session_id: session.id,
                    raw_phase_outputs: session.raw_phase_outputs.clone(),
                    artifacts: session.artifacts.clone(),
                });
            }
        }
    }

    pub fn get_session(&self) -> Option<Session> {
        self.read().session.clone()
    }

    pub fn get_slot_content(&self, slot: SlotId) -> Option<PhaseResult> {
        self.read()
            .session
            .as_ref()
            .and_then(|s| s.slot(slot).cloned())
    }

    pub fn get_progress(&self) -> Progress {
        ProgressAggregator::aggregate(self.read().session.as_ref())
    }

    pub fn is_generating(&self) -> bool {
        self.read().session.as_ref().map_or(false, |s| s.is_generating)
    }

    /// Number of transitions applied so far.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Every event published from now on, including one
    /// `session.state_changed` per applied transition.
    pub fn subscribe(&self) -> EventSubscriber {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::{ErrorKind, ModeConfig, PhaseContent, PhaseId, SessionError};

    fn done(phase: PhaseId) -> PhaseResult {
        PhaseResult::completed(phase, PhaseContent::Text(phase.as_str().to_string()), "test")
    }

    fn drain(rx: &mut EventSubscriber) -> Vec<events::EventEnvelope> {
        let mut out = Vec::new();
        while let Some(envelope) = rx.try_recv() {
            out.push(envelope);
        }
        out
    }

    #[test]
    fn test_begin_and_dispatch_publish_state_changes_in_order() {
        let store = SessionStore::new(EventBus::new());
        let mut rx = store.subscribe();

        let session = store
            .begin(SessionEvent::started(&ModeConfig::standard(), "shop"))
            .unwrap();
        store.dispatch(SessionEvent::phase_completed(done(PhaseId::Analysis)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
        match &events[1].event {
            Event::SessionStateChanged {
                session_id,
                revision,
                transition,
                completed,
                ..
            } => {
                assert_eq!(*session_id, session.id);
                assert_eq!(*revision, 2);
                assert_eq!(transition, "phase_completed");
                assert_eq!(*completed, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(store.get_progress().percent, 25);
        assert!(store.get_slot_content(SlotId::Analysis).is_some());
    }

    #[test]
    fn test_begin_refuses_while_generating() {
        let store = SessionStore::new(EventBus::new());
        let first = store
            .begin(SessionEvent::started(&ModeConfig::standard(), "shop"))
            .unwrap();

        let err = store
            .begin(SessionEvent::started(&ModeConfig::standard(), "again"))
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionInFlight(id) if id == first.id));
        assert!(matches!(store.reset(), Err(OrchestratorError::SessionInFlight(_))));
    }

    #[test]
    fn test_begin_replaces_terminal_session() {
        let store = SessionStore::new(EventBus::new());
        let first = store
            .begin(SessionEvent::started(&ModeConfig::standard(), "shop"))
            .unwrap();
        store.dispatch(SessionEvent::fatal_error(SessionError::cancelled(None)));

        let mut rx = store.subscribe();
        let second = store
            .begin(SessionEvent::started(&ModeConfig::standard(), "shop"))
            .unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.is_generating);

        let events = drain(&mut rx);
        assert!(matches!(events[1].event, Event::SessionReset { session_id } if session_id == first.id));
    }

    #[test]
    fn test_finalize_published_once_on_completion() {
        let store = SessionStore::new(EventBus::new());
        let mut rx = store.subscribe();
        store
            .begin(SessionEvent::started(&ModeConfig::standard(), "shop"))
            .unwrap();

        for phase in [
            PhaseId::Analysis,
            PhaseId::Schema,
            PhaseId::Implementation,
            PhaseId::Validation,
        ] {
            store.dispatch(SessionEvent::phase_completed(done(phase)));
        }
        store.dispatch(SessionEvent::phase_completed(done(PhaseId::Validation)));

        let finalized: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e.event, Event::SessionFinalized { .. }))
            .collect();
        assert_eq!(finalized.len(), 1);
        match &finalized[0].event {
            Event::SessionFinalized {
                raw_phase_outputs,
                artifacts,
                ..
            } => {
                assert_eq!(raw_phase_outputs.len(), 4);
                assert_eq!(artifacts.len(), 4);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_fatal_error_publishes_failure() {
        let store = SessionStore::new(EventBus::new());
        let mut rx = store.subscribe();
        store
            .begin(SessionEvent::started(&ModeConfig::standard(), "shop"))
            .unwrap();
        store.dispatch(SessionEvent::fatal_error(SessionError::new(
            ErrorKind::RetryExhausted,
            "gave up",
        )));

        let events = drain(&mut rx);
        assert!(matches!(
            &events.last().unwrap().event,
            Event::SessionFailed { error, .. } if error.kind == ErrorKind::RetryExhausted
        ));
        assert!(!store.is_generating());
    }

    #[test]
    fn test_noop_event_does_not_bump_revision() {
        let store = SessionStore::new(EventBus::new());
        store.dispatch(SessionEvent::phase_started(PhaseId::Analysis));
        assert_eq!(store.revision(), 0);
        assert!(matches!(store.reset(), Err(OrchestratorError::NoActiveSession)));
    }
}
