//! Generator capability for the schema generation pipeline
//!
//! The orchestrator only sees the [`Generator`] trait: given a phase and
//! its context, eventually return raw text or a classified
//! [`GeneratorError`]. [`OpenRouterGenerator`] is the HTTP implementation
//! used by the CLI; tests substitute scripted generators.

pub mod error;
pub mod openrouter;

use async_trait::async_trait;
use schemaforge_core::{PhaseContext, PhaseId};
use std::sync::Arc;
use std::time::Duration;

pub use error::{GeneratorError, Result};
pub use openrouter::{OpenRouterConfig, OpenRouterGenerator};

#[async_trait]
pub trait Generator: Send + Sync {
    /// Short label used in logs and narration.
    fn name(&self) -> &str {
        "generator"
    }

    /// Produce raw text for `phase`. Implementations should give up once
    /// `timeout` has elapsed and report [`GeneratorError::Timeout`].
    async fn invoke(
        &self,
        phase: PhaseId,
        context: &PhaseContext,
        timeout: Duration,
    ) -> Result<String>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn invoke(
        &self,
        phase: PhaseId,
        context: &PhaseContext,
        timeout: Duration,
    ) -> Result<String> {
        (**self).invoke(phase, context, timeout).await
    }
}
