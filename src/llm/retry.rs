//! Bounded-wait retry wrapper around any `LlmProvider`.
//!
//! Every attempt is capped by a timeout. Transient failures (transport errors,
//! timeouts, rate limits) are retried up to `max_retries` times; anything else,
//! or the last transient failure, is returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Retry and timeout settings for oracle calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Upper bound on a single attempt.
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Pause before retrying when the provider gave no retry-after hint.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Provider wrapper applying a `RetryPolicy`.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match tokio::time::timeout(self.policy.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                provider: self.inner.model_name().to_string(),
                timeout: self.policy.timeout,
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt(request.clone()).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = match &e {
                        LlmError::RateLimited {
                            retry_after: Some(after),
                            ..
                        } => *after,
                        _ => self.policy.backoff,
                    };
                    warn!(
                        model = self.inner.model_name(),
                        attempt,
                        error = %e,
                        "Oracle call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
