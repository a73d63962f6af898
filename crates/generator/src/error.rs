use thiserror::Error;

/// Classified failure of a single generator call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Generator rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("Generator temporarily unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("Generator call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Request rejected ({status:?}): {message}")]
    Rejected { status: Option<u16>, message: String },

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Generator misconfigured: {0}")]
    Configuration(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GeneratorError {
    /// Rate limiting, temporary unavailability, timeouts and network
    /// failures are worth another attempt. Everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Network(_) => "network",
            Self::Rejected { .. } => "rejected",
            Self::Unauthorized(_) => "unauthorized",
            Self::Configuration(_) => "configuration",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<u64>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited { retry_after },
            408 => Self::Timeout { after_ms: 0 },
            401 | 403 => Self::Unauthorized(message),
            500..=599 => Self::Unavailable { status, message },
            _ => Self::Rejected {
                status: Some(status),
                message,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
