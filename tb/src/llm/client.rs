//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless generation client - each call is independent
///
/// Conversation context travels inside the request (system prompt plus the
/// recent history); the client keeps nothing between calls. Pacing is not
/// the client's concern: every call is gated by the dispatcher upstream.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::llm::TokenUsage;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing::debug;

    /// One scripted answer
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        Text(String),
        RateLimited(Option<Duration>),
        ApiError(u16),
    }

    impl MockOutcome {
        pub fn text(text: impl Into<String>) -> Self {
            MockOutcome::Text(text.into())
        }
    }

    /// Mock client for unit tests: replays scripted outcomes in order
    pub struct MockLlmClient {
        outcomes: Mutex<VecDeque<MockOutcome>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlmClient {
        pub fn new(outcomes: Vec<MockOutcome>) -> Self {
            debug!(outcome_count = %outcomes.len(), "MockLlmClient::new: called");
            Self {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            debug!("MockLlmClient::call_count: called");
            self.requests.lock().unwrap().len()
        }

        /// Requests received so far
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            self.requests.lock().unwrap().push(request);
            let next = self.outcomes.lock().unwrap().pop_front();
            match next {
                Some(MockOutcome::Text(text)) => Ok(CompletionResponse {
                    content: Some(text),
                    usage: TokenUsage::default(),
                }),
                Some(MockOutcome::RateLimited(retry_after)) => Err(LlmError::RateLimited { retry_after }),
                Some(MockOutcome::ApiError(status)) => Err(LlmError::ApiError {
                    status,
                    message: "mock failure".to_string(),
                }),
                None => {
                    debug!("MockLlmClient::complete: no more mock outcomes");
                    Err(LlmError::InvalidResponse("No more mock responses".to_string()))
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_replays_outcomes() {
            let client = MockLlmClient::new(vec![
                MockOutcome::text("Response 1"),
                MockOutcome::RateLimited(Some(Duration::from_secs(5))),
            ]);
            let req = CompletionRequest::single("Test", "hi", 100);

            let resp = client.complete(req.clone()).await.unwrap();
            assert_eq!(resp.content, Some("Response 1".to_string()));

            let err = client.complete(req.clone()).await.unwrap_err();
            assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));

            assert!(client.complete(req).await.is_err());
            assert_eq!(client.call_count(), 3);
        }
    }
}
