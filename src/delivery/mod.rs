//! Document delivery: render the final document text and store it, yielding a
//! public locator.

pub mod render;
pub mod storage;

pub use render::{DocumentFormat, RenderedDocument, render};
pub use storage::{BlobStore, GcsBlobStore, LocalBlobStore};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::DeliveryError;

/// The terminal artifact of an interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    /// Document text as produced by the oracle.
    pub content: String,
    pub format: DocumentFormat,
    /// Public URL of the stored artifact.
    pub locator: String,
    pub delivered_at: DateTime<Utc>,
}

/// Renders documents and pushes them to a `BlobStore`.
pub struct DocumentDelivery {
    store: Arc<dyn BlobStore>,
    title: String,
    format: DocumentFormat,
}

impl DocumentDelivery {
    pub fn new(store: Arc<dyn BlobStore>, title: impl Into<String>, format: DocumentFormat) -> Self {
        Self {
            store,
            title: title.into(),
            format,
        }
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Render `content` and upload it.
    pub async fn deliver(&self, content: &str) -> Result<GeneratedDocument, DeliveryError> {
        let rendered = render(&self.title, content, self.format)?;
        let object = object_name(&self.title, self.format);
        let size = rendered.bytes.len();
        let content_type = rendered.content_type();

        let locator = self.store.put(&object, rendered.bytes, content_type).await?;
        info!(
            backend = self.store.name(),
            object = %object,
            size,
            "Document delivered"
        );

        Ok(GeneratedDocument {
            content: content.to_string(),
            format: self.format,
            locator,
            delivered_at: Utc::now(),
        })
    }
}

/// `<title-slug>-<uuid>.<ext>`, unique per delivery.
fn object_name(title: &str, format: DocumentFormat) -> String {
    let slug = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    };
    format!("{slug}-{}.{}", Uuid::new_v4().simple(), format.extension())
}
