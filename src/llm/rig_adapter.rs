//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionError, CompletionModel, Message};
use rig::http_client;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Adapter over any rig completion model.
///
/// Stateless: rig's generic `CompletionModel` exposes no response id, so
/// `previous_response_id` is not forwarded and `response_id` is always `None`.
/// Every prompt carries the full transcript, so no context is lost.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split our message list into (preamble, history, prompt) as rig expects.
fn to_rig_messages(
    messages: &[ChatMessage],
) -> Result<(Option<String>, Vec<Message>, Message), LlmError> {
    let preamble: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let mut history: Vec<Message> = messages
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(Message::user(m.content.clone())),
            Role::Assistant => Some(Message::assistant(m.content.clone())),
            Role::System => None,
        })
        .collect();

    let last_is_user = messages
        .iter()
        .rev()
        .find(|m| m.role != Role::System)
        .is_some_and(|m| m.role == Role::User);
    if !last_is_user {
        return Err(LlmError::InvalidResponse {
            provider: "rig".to_string(),
            reason: "completion request must end with a user message".to_string(),
        });
    }
    let prompt = history.pop().ok_or_else(|| LlmError::InvalidResponse {
        provider: "rig".to_string(),
        reason: "completion request has no messages".to_string(),
    })?;

    let preamble = if preamble.is_empty() {
        None
    } else {
        Some(preamble.join("\n\n"))
    };
    Ok((preamble, history, prompt))
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = to_rig_messages(&request.messages)?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&self.model_name, e))?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

/// Map a rig failure onto our error kinds so only retryable ones are retried.
fn classify_error(provider: &str, err: CompletionError) -> LlmError {
    let provider = provider.to_string();
    match err {
        CompletionError::HttpError(http_client::Error::InvalidStatusCode(status)) => {
            from_status(provider, status.as_u16(), status.to_string())
        }
        CompletionError::HttpError(http_client::Error::InvalidStatusCodeWithMessage(
            status,
            message,
        )) => from_status(provider, status.as_u16(), message),
        CompletionError::ProviderError(message) => from_provider_message(provider, message),
        CompletionError::JsonError(e) => LlmError::InvalidResponse {
            provider,
            reason: e.to_string(),
        },
        CompletionError::ResponseError(reason) => LlmError::InvalidResponse { provider, reason },
        CompletionError::HttpError(e) => LlmError::RequestFailed {
            provider,
            reason: e.to_string(),
        },
        other => LlmError::Rejected {
            provider,
            reason: other.to_string(),
        },
    }
}

fn from_status(provider: String, status: u16, reason: String) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthFailed { provider },
        429 => LlmError::RateLimited {
            retry_after: parse_retry_after(&reason),
            provider,
        },
        408 | 500..=599 => LlmError::RequestFailed { provider, reason },
        _ => LlmError::Rejected { provider, reason },
    }
}

/// Providers report non-2xx replies as their error body, so classify by text.
fn from_provider_message(provider: String, message: String) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("rate_limit") {
        LlmError::RateLimited {
            retry_after: parse_retry_after(&message),
            provider,
        }
    } else if lower.contains("authentication")
        || lower.contains("api key")
        || lower.contains("api_key")
        || lower.contains("permission")
    {
        LlmError::AuthFailed { provider }
    } else if lower.contains("invalid_request") || lower.contains("not_found") {
        LlmError::Rejected {
            provider,
            reason: message,
        }
    } else {
        LlmError::RequestFailed {
            provider,
            reason: message,
        }
    }
}

/// Read a "try again in 1.5s" / "try again in 200ms" hint.
fn parse_retry_after(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();
    let rest = &lower[lower.find("try again in ")? + "try again in ".len()..];
    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let value: f64 = rest[..number_len].parse().ok()?;
    let unit = rest[number_len..].trim_start();
    let secs = if unit.starts_with("ms") {
        value / 1000.0
    } else if unit.starts_with('s') {
        value
    } else {
        return None;
    };
    Duration::try_from_secs_f64(secs).ok()
}
