//! Domain types for the schema generation pipeline.
//!
//! Everything here is plain data: phase and slot identifiers, the static
//! per-mode tables, phase results, and the `Session` aggregate. The
//! orchestrator crate owns all behavior that mutates a session.

pub mod domain;
pub mod error;

pub use domain::context::{PhaseContext, PriorOutput};
pub use domain::mode::{GenerationMode, ModeConfig, PhaseSpec, SlotId, SlotRule};
pub use domain::phase::{
    ArtifactSection, PhaseContent, PhaseId, PhaseResult, PhaseStatus, SectionBody,
    PENDING_SECTION_PLACEHOLDER,
};
pub use domain::session::{ErrorKind, LogEntry, Session, SessionError};
pub use error::{CoreError, Result};
