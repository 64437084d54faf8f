//! Generator: the one way the conversation layer reaches the capability
//!
//! Every attempt waits for a dispatcher ticket, runs under the per-request
//! timeout, and rate-limit signals are retried a bounded number of times.
//! Callers only ever see `Generation::Text` or `Generation::Unavailable`.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, warn};

use super::{CompletionRequest, Generation, LlmClient, LlmError};
use crate::dispatcher::Dispatcher;
use crate::prompts::{PromptContext, PromptLoader};

/// Rendering and token settings shared by every generation
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// Template name (`assistant`, `classify`, `clarify`)
    pub template: &'static str,
    pub prompt: PromptContext,
    pub max_tokens: u32,
}

/// Optional capability client behind the shared dispatcher
#[derive(Clone)]
pub struct Generator {
    client: Option<Arc<dyn LlmClient>>,
    dispatcher: Dispatcher,
    prompts: Arc<PromptLoader>,
}

impl Generator {
    pub fn new(client: Option<Arc<dyn LlmClient>>, dispatcher: Dispatcher, prompts: Arc<PromptLoader>) -> Self {
        debug!(has_client = client.is_some(), "Generator::new: called");
        Self {
            client,
            dispatcher,
            prompts,
        }
    }

    /// Whether a capability is configured at all
    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Render the template for `ctx` and generate a reply to `user_text`
    pub async fn generate(&self, ctx: &GenerationContext, user_text: &str) -> Generation {
        debug!(template = ctx.template, "Generator::generate: called");
        if self.client.is_none() {
            debug!("Generator::generate: no client configured");
            return Generation::Unavailable;
        }

        let system_prompt = match self.prompts.render(ctx.template, &ctx.prompt) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(template = ctx.template, error = %e, "Failed to render prompt");
                return Generation::Unavailable;
            }
        };

        self.complete(CompletionRequest::single(system_prompt, user_text, ctx.max_tokens))
            .await
    }

    /// Run one request through the dispatcher with bounded rate-limit retries
    pub async fn complete(&self, request: CompletionRequest) -> Generation {
        let Some(client) = &self.client else {
            debug!("Generator::complete: no client configured");
            return Generation::Unavailable;
        };

        let config = self.dispatcher.config();
        let mut retries = 0;
        loop {
            if self.dispatcher.enqueue().await.await.is_err() {
                warn!("Dispatcher unavailable, skipping generation");
                return Generation::Unavailable;
            }

            let result = match timeout(config.request_timeout(), client.complete(request.clone())).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(config.request_timeout())),
            };

            match Generation::from(result) {
                Generation::RateLimited { retry_after } => {
                    let backoff = self.dispatcher.on_rate_limited(retry_after).await;
                    if retries >= config.max_retries {
                        warn!(retries, "Rate limit persisted after retries, capability unavailable");
                        self.dispatcher.record_abandoned().await;
                        return Generation::Unavailable;
                    }
                    retries += 1;
                    warn!(
                        attempt = retries,
                        max_retries = config.max_retries,
                        backoff_secs = backoff.as_secs(),
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Generation::Text(text) => {
                    debug!(len = text.len(), "Generator::complete: text");
                    return Generation::Text(text);
                }
                Generation::Unavailable => {
                    debug!("Generator::complete: unavailable");
                    return Generation::Unavailable;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::llm::client::mock::{MockLlmClient, MockOutcome};
    use crate::llm::CompletionResponse;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::Instant;

    fn generator(client: Option<Arc<dyn LlmClient>>) -> Generator {
        Generator::new(
            client,
            Dispatcher::spawn(DispatcherConfig::default()),
            Arc::new(PromptLoader::embedded_only()),
        )
    }

    fn classify_ctx() -> GenerationContext {
        GenerationContext {
            template: "classify",
            prompt: PromptContext::for_classification("category", &["Healthcare", "Other"]),
            max_tokens: 20,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_passes_through() {
        let mock = Arc::new(MockLlmClient::new(vec![MockOutcome::text("Healthcare")]));
        let generator = generator(Some(mock.clone()));

        let result = generator.generate(&classify_ctx(), "the clinic is closed").await;
        assert_eq!(result, Generation::Text("Healthcare".to_string()));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system_prompt.contains("- Healthcare"));
        assert_eq!(requests[0].messages[0].content, "the clinic is closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_rate_limit_then_succeeds() {
        let mock = Arc::new(MockLlmClient::new(vec![
            MockOutcome::RateLimited(None),
            MockOutcome::RateLimited(Some(Duration::from_secs(5))),
            MockOutcome::text("Other"),
        ]));
        let generator = generator(Some(mock.clone()));

        let start = Instant::now();
        let result = generator.generate(&classify_ctx(), "something").await;
        assert_eq!(result, Generation::Text("Other".to_string()));
        assert_eq!(mock.call_count(), 3);
        // First backoff has no hint: the full window at window start
        assert!(start.elapsed() >= Duration::from_secs(65));

        let stats = generator.dispatcher().stats().await;
        assert_eq!(stats.total_rate_limited, 2);
        assert_eq!(stats.total_abandoned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_two_retries() {
        let mock = Arc::new(MockLlmClient::new(vec![
            MockOutcome::RateLimited(Some(Duration::from_secs(1))),
            MockOutcome::RateLimited(Some(Duration::from_secs(1))),
            MockOutcome::RateLimited(Some(Duration::from_secs(1))),
            MockOutcome::text("never reached"),
        ]));
        let generator = generator(Some(mock.clone()));

        let result = generator.generate(&classify_ctx(), "something").await;
        assert_eq!(result, Generation::Unavailable);
        assert_eq!(mock.call_count(), 3);

        let stats = generator.dispatcher().stats().await;
        assert_eq!(stats.total_rate_limited, 3);
        assert_eq!(stats.total_abandoned, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_hint_sleeps_at_most_max_backoff() {
        let mock = Arc::new(MockLlmClient::new(vec![
            MockOutcome::RateLimited(Some(Duration::from_secs(86_400))),
            MockOutcome::text("Other"),
        ]));
        let generator = generator(Some(mock.clone()));

        let start = Instant::now();
        let result = generator.generate(&classify_ctx(), "something").await;
        assert_eq!(result, Generation::Text("Other".to_string()));
        assert_eq!(mock.call_count(), 2);

        let max = DispatcherConfig::default().max_backoff();
        assert!(start.elapsed() >= max);
        assert!(start.elapsed() < max + Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_error_is_unavailable_without_retry() {
        let mock = Arc::new(MockLlmClient::new(vec![MockOutcome::ApiError(500), MockOutcome::text("x")]));
        let generator = generator(Some(mock.clone()));

        assert_eq!(generator.generate(&classify_ctx(), "x").await, Generation::Unavailable);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_client_is_unavailable() {
        let generator = generator(None);
        assert!(!generator.is_available());
        assert_eq!(generator.generate(&classify_ctx(), "x").await, Generation::Unavailable);
        assert_eq!(generator.dispatcher().stats().await.total_released, 0);
    }

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(CompletionResponse::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unavailable() {
        let generator = generator(Some(Arc::new(SlowClient)));
        let start = Instant::now();
        assert_eq!(generator.generate(&classify_ctx(), "x").await, Generation::Unavailable);
        assert!(start.elapsed() < Duration::from_secs(120));
    }
}
