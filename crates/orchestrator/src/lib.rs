//! Generation pipeline orchestrator.
//!
//! Phases run one after another through the [`GeneratorAdapter`]; every
//! outcome becomes a [`SessionEvent`] applied by the [`SessionStore`], the
//! only writer of session state. Readers take snapshots or subscribe to
//! the event bus.

pub mod adapter;
pub mod config;
pub mod error;
pub mod extractor;
pub mod merger;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod state_machine;
pub mod store;

pub use adapter::GeneratorAdapter;
pub use config::{OrchestratorConfig, RetryConfig};
pub use error::{OrchestratorError, Result};
pub use extractor::{ContentExtractor, Extraction, ExtractionStrategy};
pub use merger::ContentMerger;
pub use pipeline::{PhasePipelineExecutor, PipelineState};
pub use progress::{Progress, ProgressAggregator};
pub use retry::{RetryAttempt, RetryError, RetryPolicy, Retryable};
pub use runner::{GenerationOrchestrator, SessionHandle};
pub use state_machine::{SessionEvent, SessionStateMachine};
pub use store::SessionStore;
