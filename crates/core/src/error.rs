use thiserror::Error;

use crate::domain::mode::SlotId;
use crate::domain::phase::PhaseId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Mode {mode} defines no phases")]
    EmptyMode { mode: String },

    #[error("Phase {phase} is listed more than once")]
    DuplicatePhase { phase: PhaseId },

    #[error("Phase {phase} depends on {dependency}, which does not run before it")]
    DependencyOrder { phase: PhaseId, dependency: PhaseId },

    #[error("Slot {slot} is mapped more than once")]
    DuplicateSlot { slot: SlotId },

    #[error("Slot {slot} has no contributing phases")]
    EmptySlotRule { slot: SlotId },

    #[error("Slot {slot} references phase {phase}, which is not part of this mode")]
    MergeInconsistency { slot: SlotId, phase: PhaseId },
}

pub type Result<T> = std::result::Result<T, CoreError>;
