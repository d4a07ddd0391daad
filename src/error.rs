//! Error types for the intake agent.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} rejected the request: {reason}")]
    Rejected { provider: String, reason: String },
}

impl LlmError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures, timeouts and rate limits are transient. Auth failures,
    /// rejected requests and unusable content are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

/// Document rendering and upload errors.
///
/// Kept apart from `LlmError` so a failed delivery is never reported to the
/// user as a failed generation.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to render {format} document: {reason}")]
    Render { format: String, reason: String },

    #[error("Upload of {object} to {backend} failed: {reason}")]
    Upload {
        backend: String,
        object: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interview state machine errors.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    #[error("Inbound message is empty")]
    EmptyMessage,

    #[error("Cannot transition interview from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let failed = LlmError::RequestFailed {
            provider: "openai".into(),
            reason: "connection reset".into(),
        };
        let timeout = LlmError::Timeout {
            provider: "openai".into(),
            timeout: Duration::from_secs(60),
        };
        let limited = LlmError::RateLimited {
            provider: "openai".into(),
            retry_after: None,
        };
        assert!(failed.is_transient());
        assert!(timeout.is_transient());
        assert!(limited.is_transient());

        let auth = LlmError::AuthFailed {
            provider: "openai".into(),
        };
        let invalid = LlmError::InvalidResponse {
            provider: "openai".into(),
            reason: "empty".into(),
        };
        let rejected = LlmError::Rejected {
            provider: "openai".into(),
            reason: "unknown model".into(),
        };
        assert!(!auth.is_transient());
        assert!(!invalid.is_transient());
        assert!(!rejected.is_transient());
    }

    #[test]
    fn delivery_errors_name_their_stage() {
        let render = DeliveryError::Render {
            format: "structured-doc".into(),
            reason: "empty body".into(),
        };
        assert!(render.to_string().contains("render"));

        let upload = DeliveryError::Upload {
            backend: "gcs".into(),
            object: "plan.html".into(),
            reason: "403".into(),
        };
        assert!(upload.to_string().contains("plan.html"));
        assert!(upload.to_string().contains("gcs"));
    }
}
