//! Convert stage: turn successful fetches into documents.

use std::sync::Arc;

use tracing::{debug, warn};

use harvester_markdown::{ConvertInput, TextConverter};
use harvester_shared::{Document, FetchOutcome, FetchedContent, RetryPolicy};

/// Outcome of converting one fetched item.
#[derive(Debug)]
pub enum Conversion {
    /// Failed fetch or empty payload; nothing to report.
    Skipped,
    /// The converter errored or produced no text.
    Failed(String),
    Converted(Document),
}

impl Conversion {
    #[cfg(test)]
    pub(crate) fn into_document(self) -> Option<Document> {
        match self {
            Self::Converted(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Wraps a [`TextConverter`] with the fetch-outcome precondition checks.
pub struct ContentConverter {
    converter: Arc<dyn TextConverter>,
    retry: RetryPolicy,
}

impl ContentConverter {
    pub fn new(converter: Arc<dyn TextConverter>, retry: RetryPolicy) -> Self {
        Self { converter, retry }
    }

    /// Convert one fetched item.
    ///
    /// Metadata on the document is copied from the candidate; only the body
    /// comes from the converter.
    pub async fn convert(&self, fetched: &FetchedContent) -> Conversion {
        let input = match fetched.outcome() {
            FetchOutcome::LocalFile(path) if !path.as_os_str().is_empty() => {
                ConvertInput::File(path)
            }
            FetchOutcome::RawText(text) if !text.trim().is_empty() => ConvertInput::Text(text),
            _ => {
                debug!(url = %fetched.source_url(), "nothing to convert, skipping");
                return Conversion::Skipped;
            }
        };

        let url = fetched.source_url();
        match self
            .retry
            .run("convert", || self.converter.convert(input))
            .await
        {
            Ok(body) if !body.trim().is_empty() => {
                debug!(%url, chars = body.len(), "converted");
                Conversion::Converted(Document::from_candidate(fetched.candidate(), body))
            }
            Ok(_) => {
                warn!(%url, "converter returned no text");
                Conversion::Failed(format!("no text extracted from {url}"))
            }
            Err(e) => {
                warn!(%url, error = %e, "conversion failed");
                Conversion::Failed(format!("failed to convert {url}: {e}"))
            }
        }
    }
}
