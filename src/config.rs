//! Configuration, loaded from environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::delivery::DocumentFormat;
use crate::error::ConfigError;
use crate::interview::{MarkerMatch, PolicyKind, TopicSchedule};
use crate::llm::{LlmBackend, LlmConfig, RetryPolicy};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub oracle: OracleConfig,
    pub interview: InterviewConfig,
    pub delivery: DeliveryConfig,
    pub server: ServerConfig,
}

/// Generation oracle settings.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub llm: LlmConfig,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Interview behaviour.
#[derive(Debug, Clone)]
pub struct InterviewConfig {
    pub schedule: TopicSchedule,
    pub policy: PolicyKind,
    pub marker_match: MarkerMatch,
}

/// Where finished documents go.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local directory, served under a public base URL.
    Local {
        dir: PathBuf,
        public_base_url: String,
    },
    /// Google Cloud Storage bucket.
    Gcs {
        bucket: String,
        token: Option<SecretString>,
    },
}

/// Rendering and storage of the final document.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub format: DocumentFormat,
    pub title: String,
    pub storage: StorageConfig,
}

/// HTTP server, chunking and session storage.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Characters per outbound message payload.
    pub chunk_size: usize,
    /// libSQL database file; sessions stay in memory when unset.
    pub db_path: Option<PathBuf>,
}

impl IntakeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let backend: LlmBackend = vars.parse("INTAKE_LLM_BACKEND", LlmBackend::OpenAi)?;
        let (key_var, default_model) = match backend {
            LlmBackend::OpenAi => ("OPENAI_API_KEY", DEFAULT_OPENAI_MODEL),
            LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", DEFAULT_ANTHROPIC_MODEL),
        };
        let api_key = vars
            .get(key_var)
            .ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let retry = RetryPolicy {
            timeout: Duration::from_secs(vars.parse("INTAKE_ORACLE_TIMEOUT_SECS", 60u64)?),
            max_retries: vars.parse("INTAKE_ORACLE_RETRIES", 1u32)?,
            ..RetryPolicy::default()
        };

        let temperature: f32 = vars.parse("INTAKE_TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid("INTAKE_TEMPERATURE", "must be between 0.0 and 2.0"));
        }

        let oracle = OracleConfig {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model: vars.get("INTAKE_MODEL").unwrap_or_else(|| default_model.to_string()),
                retry,
            },
            temperature,
            max_tokens: vars.parse("INTAKE_MAX_TOKENS", 2048u32)?,
        };

        let schedule = match vars.get("INTAKE_TOPICS") {
            Some(list) => TopicSchedule::new(list.split(',')),
            None => TopicSchedule::business_plan(),
        };
        if schedule.is_empty() {
            return Err(invalid("INTAKE_TOPICS", "at least one topic is required"));
        }
        let interview = InterviewConfig {
            schedule,
            policy: vars.parse("INTAKE_COMPLETION_POLICY", PolicyKind::Oracle)?,
            marker_match: vars.parse("INTAKE_MARKER_MATCH", MarkerMatch::Exact)?,
        };

        let storage = match vars.get("INTAKE_GCS_BUCKET") {
            Some(bucket) => StorageConfig::Gcs {
                bucket,
                token: vars.get("INTAKE_GCS_TOKEN").map(SecretString::from),
            },
            None => StorageConfig::Local {
                dir: PathBuf::from(
                    vars.get("INTAKE_STORAGE_DIR")
                        .unwrap_or_else(|| "./data/documents".to_string()),
                ),
                public_base_url: vars
                    .get("INTAKE_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:5006/documents".to_string()),
            },
        };
        let delivery = DeliveryConfig {
            format: vars.parse("INTAKE_DOCUMENT_FORMAT", DocumentFormat::StructuredDoc)?,
            title: vars
                .get("INTAKE_DOCUMENT_TITLE")
                .unwrap_or_else(|| "Business Plan".to_string()),
            storage,
        };

        let chunk_size: usize = vars.parse("INTAKE_CHUNK_SIZE", 1597)?;
        if chunk_size == 0 {
            return Err(invalid("INTAKE_CHUNK_SIZE", "must be greater than zero"));
        }
        let server = ServerConfig {
            port: vars.parse("INTAKE_PORT", 5006u16)?,
            chunk_size,
            db_path: vars.get("INTAKE_DB_PATH").map(PathBuf::from),
        };

        Ok(Self {
            oracle,
            interview,
            delivery,
            server,
        })
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value of `key`, trimmed.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, e.to_string())),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<IntakeConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IntakeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_only_api_key() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();

        assert_eq!(config.oracle.llm.backend, LlmBackend::OpenAi);
        assert_eq!(config.oracle.llm.api_key.expose_secret(), "sk-test");
        assert_eq!(config.oracle.llm.model, "gpt-4o-mini");
        assert_eq!(config.oracle.llm.retry.timeout, Duration::from_secs(60));
        assert_eq!(config.oracle.llm.retry.max_retries, 1);
        assert!((config.oracle.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.oracle.max_tokens, 2048);

        assert_eq!(config.interview.schedule, TopicSchedule::business_plan());
        assert_eq!(config.interview.policy, PolicyKind::Oracle);
        assert_eq!(config.interview.marker_match, MarkerMatch::Exact);

        assert_eq!(config.delivery.format, DocumentFormat::StructuredDoc);
        assert_eq!(config.delivery.title, "Business Plan");
        assert!(matches!(
            config.delivery.storage,
            StorageConfig::Local { ref public_base_url, .. }
                if public_base_url == "http://localhost:5006/documents"
        ));

        assert_eq!(config.server.port, 5006);
        assert_eq!(config.server.chunk_size, 1597);
        assert!(config.server.db_path.is_none());
    }

    #[test]
    fn missing_api_key_is_reported() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "OPENAI_API_KEY"));

        let err = load(&[("INTAKE_LLM_BACKEND", "anthropic"), ("OPENAI_API_KEY", "x")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "ANTHROPIC_API_KEY"));
    }

    #[test]
    fn anthropic_backend_uses_its_default_model() {
        let config = load(&[
            ("INTAKE_LLM_BACKEND", "Anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ])
        .unwrap();
        assert_eq!(config.oracle.llm.backend, LlmBackend::Anthropic);
        assert_eq!(config.oracle.llm.model, DEFAULT_ANTHROPIC_MODEL);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("INTAKE_MODEL", "gpt-4o"),
            ("INTAKE_TEMPERATURE", "0.2"),
            ("INTAKE_TOPICS", "Mission, , Customers ,Pricing"),
            ("INTAKE_COMPLETION_POLICY", "coverage"),
            ("INTAKE_MARKER_MATCH", "substring"),
            ("INTAKE_DOCUMENT_FORMAT", "plain-text"),
            ("INTAKE_GCS_BUCKET", "plans"),
            ("INTAKE_GCS_TOKEN", "ya29"),
            ("INTAKE_DB_PATH", "/tmp/sessions.db"),
            ("INTAKE_PORT", "8080"),
            ("INTAKE_CHUNK_SIZE", "300"),
        ])
        .unwrap();

        assert_eq!(config.oracle.llm.model, "gpt-4o");
        assert_eq!(
            config.interview.schedule.topics(),
            &["Mission", "Customers", "Pricing"]
        );
        assert_eq!(config.interview.policy, PolicyKind::Coverage);
        assert_eq!(config.interview.marker_match, MarkerMatch::Substring);
        assert_eq!(config.delivery.format, DocumentFormat::PlainText);
        match config.delivery.storage {
            StorageConfig::Gcs { bucket, token } => {
                assert_eq!(bucket, "plans");
                assert_eq!(token.unwrap().expose_secret(), "ya29");
            }
            other => panic!("expected GCS storage, got {other:?}"),
        }
        assert_eq!(config.server.db_path, Some(PathBuf::from("/tmp/sessions.db")));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.chunk_size, 300);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (key, value) in [
            ("INTAKE_PORT", "not-a-port"),
            ("INTAKE_TEMPERATURE", "5"),
            ("INTAKE_CHUNK_SIZE", "0"),
            ("INTAKE_MARKER_MATCH", "fuzzy"),
            ("INTAKE_DOCUMENT_FORMAT", "pdf"),
            ("INTAKE_TOPICS", " , "),
        ] {
            let err = load(&[("OPENAI_API_KEY", "k"), (key, value)]).unwrap_err();
            match err {
                ConfigError::InvalidValue { key: k, .. } => assert_eq!(k, key),
                other => panic!("{key}: expected InvalidValue, got {other:?}"),
            }
        }
    }
}
