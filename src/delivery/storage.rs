//! Blob storage backends for delivered documents.

use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::DeliveryError;

/// Default Google Cloud Storage JSON API endpoint.
const GCS_API_BASE: &str = "https://storage.googleapis.com";

/// Object storage that hands back a publicly resolvable URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name, for logs and errors.
    fn name(&self) -> &str;

    /// Store `bytes` under `object` and return its public URL.
    async fn put(
        &self,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DeliveryError>;
}

/// Writes objects into a local directory served under `public_base_url`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        object: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, DeliveryError> {
        if object.is_empty() || object.contains("..") || object.starts_with('/') {
            return Err(DeliveryError::Upload {
                backend: "local".to_string(),
                object: object.to_string(),
                reason: "object name must be a relative path".to_string(),
            });
        }

        let path = self.root.join(object);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "Document written to local store");

        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            object
        ))
    }
}

/// Uploads objects to a Google Cloud Storage bucket (or a compatible endpoint).
pub struct GcsBlobStore {
    client: reqwest::Client,
    bucket: String,
    token: Option<SecretString>,
    api_base: String,
}

impl GcsBlobStore {
    pub fn new(bucket: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket: bucket.into(),
            token,
            api_base: GCS_API_BASE.to_string(),
        }
    }

    /// Point uploads at a different endpoint (emulators, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.api_base.trim_end_matches('/'),
            self.bucket
        )
    }

    /// Public URL of an object once uploaded.
    pub fn public_url(&self, object: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bucket,
            object
        )
    }

    fn upload_error(&self, object: &str, reason: String) -> DeliveryError {
        DeliveryError::Upload {
            backend: "gcs".to_string(),
            object: object.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn put(
        &self,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DeliveryError> {
        let mut request = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", object)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| self.upload_error(object, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(self.upload_error(object, format!("HTTP {status}: {body}")));
        }

        debug!(bucket = %self.bucket, object, "Document uploaded");
        Ok(self.public_url(object))
    }
}
