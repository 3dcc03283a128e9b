//! The convert-to-text collaborator.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use harvester_shared::{HarvestError, Result};

use crate::cleanup;
use crate::html::{convert_html, looks_like_html};
use crate::pdf::{PDF_MAGIC, extract_pdf_text, pdf_bytes_to_text};

/// Payload handed to a [`TextConverter`].
#[derive(Debug, Clone, Copy)]
pub enum ConvertInput<'a> {
    /// A file on local disk (downloaded PDFs).
    File(&'a Path),
    /// Text already in memory (extracted pages).
    Text(&'a str),
}

/// Normalizes fetched content into plain text / Markdown.
#[async_trait]
pub trait TextConverter: Send + Sync {
    /// Unsupported input is an error; an empty string means nothing usable
    /// was found.
    async fn convert(&self, input: ConvertInput<'_>) -> Result<String>;
}

/// Default [`TextConverter`]: PDFs via their text layer, HTML via `htmd`,
/// anything else through plain-text cleanup.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownConverter;

impl MarkdownConverter {
    pub fn new() -> Self {
        Self
    }

    async fn convert_file(&self, path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => extract_pdf_text(path).await,
            "html" | "htm" => {
                let html = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| HarvestError::io(path, e))?;
                Ok(convert_html(&html, None)?.markdown)
            }
            _ => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| HarvestError::io(path, e))?;
                if bytes.starts_with(PDF_MAGIC) {
                    return tokio::task::spawn_blocking(move || pdf_bytes_to_text(&bytes))
                        .await
                        .map_err(|e| {
                            HarvestError::Conversion(format!("PDF extraction task failed: {e}"))
                        })?;
                }
                let text = String::from_utf8(bytes).map_err(|_| {
                    HarvestError::Conversion(format!(
                        "unsupported binary file: {}",
                        path.display()
                    ))
                })?;
                self.convert_text(&text)
            }
        }
    }

    fn convert_text(&self, text: &str) -> Result<String> {
        if looks_like_html(text) {
            Ok(convert_html(text, None)?.markdown)
        } else {
            Ok(cleanup::run_text_pipeline(text))
        }
    }
}

#[async_trait]
impl TextConverter for MarkdownConverter {
    #[instrument(skip_all)]
    async fn convert(&self, input: ConvertInput<'_>) -> Result<String> {
        let output = match input {
            ConvertInput::File(path) => {
                debug!(path = %path.display(), "converting file");
                self.convert_file(path).await?
            }
            ConvertInput::Text(text) => {
                debug!(chars = text.len(), "converting text");
                self.convert_text(text)?
            }
        };

        // A lone trailing newline from the cleanup passes counts as empty.
        if output.trim().is_empty() {
            return Ok(String::new());
        }
        Ok(output)
    }
}
