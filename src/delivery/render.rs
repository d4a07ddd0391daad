//! Rendering of the final document text into a storable artifact.

use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// Output formats for the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFormat {
    /// Self-contained HTML container: one heading, one body paragraph.
    StructuredDoc,
    /// The raw document text.
    PlainText,
}

impl DocumentFormat {
    /// MIME content type for uploads.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::StructuredDoc => "text/html; charset=utf-8",
            Self::PlainText => "text/plain; charset=utf-8",
        }
    }

    /// File extension for object names.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::StructuredDoc => "html",
            Self::PlainText => "txt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredDoc => "structured-doc",
            Self::PlainText => "plain-text",
        }
    }
}

impl Default for DocumentFormat {
    fn default() -> Self {
        Self::StructuredDoc
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structured-doc" | "structured" | "html" | "docx" => Ok(Self::StructuredDoc),
            "plain-text" | "plain" | "text" | "txt" => Ok(Self::PlainText),
            other => Err(format!(
                "Invalid document format: '{other}'. Expected 'structured-doc' or 'plain-text'"
            )),
        }
    }
}

/// A rendered document ready for upload.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl RenderedDocument {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Render `body` under `title` in the requested format.
pub fn render(
    title: &str,
    body: &str,
    format: DocumentFormat,
) -> Result<RenderedDocument, DeliveryError> {
    if body.trim().is_empty() {
        return Err(DeliveryError::Render {
            format: format.to_string(),
            reason: "document body is empty".to_string(),
        });
    }

    let bytes = match format {
        DocumentFormat::PlainText => body.as_bytes().to_vec(),
        DocumentFormat::StructuredDoc => {
            let title = escape_html(title);
            let body = escape_html(body);
            format!(
                "<!DOCTYPE html>\n\
                 <html>\n\
                 <head>\n\
                 <meta charset=\"utf-8\">\n\
                 <title>{title}</title>\n\
                 </head>\n\
                 <body>\n\
                 <h1>{title}</h1>\n\
                 <p style=\"white-space: pre-wrap\">{body}</p>\n\
                 </body>\n\
                 </html>\n"
            )
            .into_bytes()
        }
    };

    Ok(RenderedDocument { format, bytes })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_verbatim() {
        let doc = render("Plan", "Line one\nLine <two>", DocumentFormat::PlainText).unwrap();
        assert_eq!(doc.bytes, b"Line one\nLine <two>");
        assert_eq!(doc.content_type(), "text/plain; charset=utf-8");
    }

    #[test]
    fn structured_doc_has_single_heading_and_paragraph() {
        let doc = render(
            "Business Plan",
            "Mission: bake & sell <bread>",
            DocumentFormat::StructuredDoc,
        )
        .unwrap();
        let html = String::from_utf8(doc.bytes).unwrap();
        assert_eq!(html.matches("<h1>").count(), 1);
        assert_eq!(html.matches("<p ").count(), 1);
        assert!(html.contains("<h1>Business Plan</h1>"));
        assert!(html.contains("Mission: bake &amp; sell &lt;bread&gt;"));
    }

    #[test]
    fn empty_body_is_a_render_error() {
        let err = render("Plan", "  \n ", DocumentFormat::StructuredDoc).unwrap_err();
        assert!(matches!(err, DeliveryError::Render { .. }));
    }

    #[test]
    fn format_parsing_and_display() {
        assert_eq!(
            "structured-doc".parse::<DocumentFormat>().unwrap(),
            DocumentFormat::StructuredDoc
        );
        assert_eq!("docx".parse::<DocumentFormat>().unwrap(), DocumentFormat::StructuredDoc);
        assert_eq!("TXT".parse::<DocumentFormat>().unwrap(), DocumentFormat::PlainText);
        assert!("pdf".parse::<DocumentFormat>().is_err());
        assert_eq!(DocumentFormat::PlainText.to_string(), "plain-text");
        assert_eq!(
            serde_json::to_string(&DocumentFormat::StructuredDoc).unwrap(),
            "\"structured-doc\""
        );
    }
}
