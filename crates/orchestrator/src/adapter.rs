use std::sync::Arc;
use std::time::Duration;

use events::{Event, EventBus};
use generator::{Generator, GeneratorError};
use schemaforge_core::{PhaseContext, PhaseId, PhaseResult};
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::extractor::ContentExtractor;
use crate::retry::{RetryError, RetryPolicy};

/// Runs one phase against the generator: timeout, retry, extraction.
pub struct GeneratorAdapter {
    generator: Arc<dyn Generator>,
    retry: RetryPolicy,
    phase_timeout: Duration,
    event_bus: Option<EventBus>,
}

impl GeneratorAdapter {
    pub fn new(generator: Arc<dyn Generator>, retry: RetryPolicy, phase_timeout: Duration) -> Self {
        Self {
            generator,
            retry,
            phase_timeout,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn phase_timeout(&self) -> Duration {
        self.phase_timeout
    }

    pub async fn run(&self, phase: PhaseId, context: &PhaseContext) -> Result<PhaseResult> {
        let generator = &self.generator;
        let timeout = self.phase_timeout;
        let mut attempts = 0u32;

        debug!(
            session_id = %context.session_id,
            phase = %phase,
            generator = generator.name(),
            "Invoking generator"
        );

        let outcome = self
            .retry
            .execute_observed(
                || {
                    attempts += 1;
                    async move {
                        match tokio::time::timeout(timeout, generator.invoke(phase, context, timeout)).await {
                            Ok(result) => result,
                            Err(_) => Err(GeneratorError::Timeout {
                                after_ms: timeout.as_millis() as u64,
                            }),
                        }
                    }
                },
                |retry| {
                    if let Some(bus) = &self.event_bus {
                        bus.publish(Event::PhaseRetrying {
                            session_id: context.session_id,
                            phase,
                            attempt: retry.attempt,
                            delay_ms: retry.delay.as_millis() as u64,
                            reason: retry.error.to_string(),
                        });
                    }
                },
            )
            .await;

        match outcome {
            Ok(raw) => {
                let extraction = ContentExtractor::extract(&raw);
                let rationale = if attempts > 1 {
                    format!(
                        "Generated by {} on attempt {}, {} content",
                        generator.name(),
                        attempts,
                        extraction.strategy
                    )
                } else {
                    format!("Generated by {}, {} content", generator.name(), extraction.strategy)
                };

                info!(
                    session_id = %context.session_id,
                    phase = %phase,
                    attempts,
                    strategy = %extraction.strategy,
                    "Phase generated"
                );

                Ok(PhaseResult::completed(phase, extraction.content, rationale))
            }
            Err(RetryError::Fatal { error, .. }) => Err(OrchestratorError::Generator {
                phase,
                source: error,
            }),
            Err(RetryError::Exhausted { last, attempts }) => Err(OrchestratorError::RetryExhausted {
                phase,
                attempts,
                source: last,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use schemaforge_core::{ErrorKind, GenerationMode, PhaseContent};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Scripted {
        replies: Mutex<Vec<generator::Result<String>>>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(replies: Vec<generator::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn invoke(
            &self,
            _phase: PhaseId,
            _context: &PhaseContext,
            _timeout: Duration,
        ) -> generator::Result<String> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err(GeneratorError::Network("script exhausted".to_string()))
            } else {
                replies.remove(0)
            }
        }
    }

    fn context(phase: PhaseId) -> PhaseContext {
        PhaseContext::new(Uuid::new_v4(), GenerationMode::Standard, phase, "a bookshop")
    }

    fn adapter(generator: Scripted, max_retries: u32) -> GeneratorAdapter {
        GeneratorAdapter::new(
            Arc::new(generator),
            RetryPolicy::new(max_retries, Duration::from_millis(10)),
            Duration::from_secs(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run_extracts_content() {
        let adapter = adapter(
            Scripted::new(vec![Ok("```json\n{\"tables\": 3}\n```".to_string())]),
            3,
        );

        let result = adapter.run(PhaseId::Schema, &context(PhaseId::Schema)).await.unwrap();
        assert!(result.is_completed());
        assert_eq!(result.title, "Database Schema");
        assert_eq!(result.content.as_structured().unwrap()["tables"], 3);
        assert!(result.rationale.contains("scripted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_published_and_recovered() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let adapter = adapter(
            Scripted::new(vec![
                Err(GeneratorError::RateLimited { retry_after: None }),
                Ok("Entities: Book".to_string()),
            ]),
            3,
        )
        .with_event_bus(bus);

        let result = adapter
            .run(PhaseId::Analysis, &context(PhaseId::Analysis))
            .await
            .unwrap();
        assert_eq!(result.content, PhaseContent::Text("Entities: Book".to_string()));
        assert!(result.rationale.contains("attempt 2"));

        let envelope = rx.recv().await.unwrap();
        match envelope.event {
            Event::PhaseRetrying { phase, attempt, delay_ms, .. } => {
                assert_eq!(phase, PhaseId::Analysis);
                assert_eq!(attempt, 1);
                assert_eq!(delay_ms, 10);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_classified() {
        let adapter = adapter(
            Scripted::new(vec![
                Err(GeneratorError::Network("reset".to_string())),
                Err(GeneratorError::Network("reset".to_string())),
                Err(GeneratorError::Network("reset".to_string())),
            ]),
            2,
        );

        let err = adapter
            .run(PhaseId::Implementation, &context(PhaseId::Implementation))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RetryExhausted);
        assert!(matches!(err, OrchestratorError::RetryExhausted { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_surfaces_immediately() {
        let adapter = adapter(
            Scripted::new(vec![Err(GeneratorError::Rejected {
                status: Some(400),
                message: "bad request".to_string(),
            })]),
            3,
        );

        let err = adapter
            .run(PhaseId::Analysis, &context(PhaseId::Analysis))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_generator_counts_as_retryable_timeout() {
        let mut generator = Scripted::new(vec![
            Ok("late".to_string()),
            Ok("late".to_string()),
        ]);
        generator.delay = Some(Duration::from_secs(5));
        let adapter = adapter(generator, 1);

        let err = adapter
            .run(PhaseId::Analysis, &context(PhaseId::Analysis))
            .await
            .unwrap_err();

        match err {
            OrchestratorError::RetryExhausted { attempts, source, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(source, GeneratorError::Timeout { after_ms: 1000 });
            }
            other => panic!("expected timeout exhaustion, got {:?}", other),
        }
    }
}
