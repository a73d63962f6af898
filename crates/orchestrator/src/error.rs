use generator::GeneratorError;
use schemaforge_core::{CoreError, ErrorKind, PhaseId, SessionError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Phase {phase} failed: {source}")]
    Generator {
        phase: PhaseId,
        #[source]
        source: GeneratorError,
    },

    #[error("Phase {phase} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        phase: PhaseId,
        attempts: u32,
        #[source]
        source: GeneratorError,
    },

    #[error("Generation cancelled")]
    Cancelled { phase: Option<PhaseId> },

    #[error("Invalid mode configuration: {0}")]
    Config(#[from] CoreError),

    #[error("Invalid orchestrator configuration: {0}")]
    InvalidConfig(String),

    #[error("Session {0} is still generating")]
    SessionInFlight(Uuid),

    #[error("No active session")]
    NoActiveSession,

    #[error("Pipeline task failed: {0}")]
    Join(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl OrchestratorError {
    /// Session-facing classification of this failure.
    ///
    /// `Generator` only ever carries errors the retry policy refused to
    /// retry; retryable ones surface as `RetryExhausted`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Generator { .. } => ErrorKind::Fatal,
            Self::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Config(_) | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::SessionInFlight(_)
            | Self::NoActiveSession
            | Self::Join(_)
            | Self::ExecutionFailed(_) => ErrorKind::Fatal,
        }
    }

    pub fn phase(&self) -> Option<PhaseId> {
        match self {
            Self::Generator { phase, .. } | Self::RetryExhausted { phase, .. } => Some(*phase),
            Self::Cancelled { phase } => *phase,
            _ => None,
        }
    }

    /// Build the error recorded on the session through `fatalError`.
    pub fn to_session_error(&self) -> SessionError {
        let message = match self {
            Self::Generator { source, .. } => source.to_string(),
            Self::RetryExhausted {
                attempts, source, ..
            } => format!("gave up after {} attempts: {}", attempts, source),
            other => other.to_string(),
        };

        let mut error = SessionError::new(self.kind(), message);
        if let Some(phase) = self.phase() {
            error = error.with_phase(phase);
        }
        if let Self::RetryExhausted { attempts, .. } = self {
            error = error.with_attempts(*attempts);
        }
        error
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhaustion_maps_to_session_error() {
        let err = OrchestratorError::RetryExhausted {
            phase: PhaseId::Implementation,
            attempts: 4,
            source: GeneratorError::Timeout { after_ms: 100 },
        };

        let session_error = err.to_session_error();
        assert_eq!(session_error.kind, ErrorKind::RetryExhausted);
        assert_eq!(session_error.phase, Some(PhaseId::Implementation));
        assert_eq!(session_error.attempts, Some(4));
        assert!(session_error.message.contains("4 attempts"));
    }

    #[test]
    fn test_generator_error_kinds() {
        let fatal = OrchestratorError::Generator {
            phase: PhaseId::Schema,
            source: GeneratorError::Unauthorized("bad key".into()),
        };
        assert_eq!(fatal.kind(), ErrorKind::Fatal);
        assert_eq!(fatal.to_session_error().phase, Some(PhaseId::Schema));
    }

    #[test]
    fn test_cancelled_and_config_kinds() {
        let cancelled = OrchestratorError::Cancelled {
            phase: Some(PhaseId::Analysis),
        };
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(cancelled.to_session_error().phase, Some(PhaseId::Analysis));

        let config = OrchestratorError::from(CoreError::DuplicatePhase {
            phase: PhaseId::Schema,
        });
        assert_eq!(config.kind(), ErrorKind::Configuration);
        assert!(config.to_session_error().phase.is_none());

        let invalid = OrchestratorError::InvalidConfig("phase_timeout_ms must be greater than zero".into());
        assert_eq!(invalid.kind(), ErrorKind::Configuration);
    }
}
