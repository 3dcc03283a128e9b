//! PDF text extraction.

use std::path::Path;

use tracing::{debug, instrument};

use harvester_shared::{HarvestError, Result};

use crate::cleanup;

/// Leading bytes of every PDF file.
pub(crate) const PDF_MAGIC: &[u8] = b"%PDF";

/// Read a PDF from disk and return its normalized text layer.
///
/// Parsing is CPU-bound and runs on the blocking pool.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn extract_pdf_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| HarvestError::io(path, e))?;

    let text = tokio::task::spawn_blocking(move || pdf_bytes_to_text(&bytes))
        .await
        .map_err(|e| HarvestError::Conversion(format!("PDF extraction task failed: {e}")))??;

    debug!(chars = text.len(), "PDF text extracted");
    Ok(text)
}

/// Text layer of an in-memory PDF, cleaned of page furniture.
pub fn pdf_bytes_to_text(bytes: &[u8]) -> Result<String> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(HarvestError::Conversion("not a PDF file".into()));
    }

    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| HarvestError::Conversion(format!("PDF extraction failed: {e}")))?;

    Ok(cleanup::run_text_pipeline(&raw))
}
