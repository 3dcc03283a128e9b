//! Full-content retrieval for ranked candidates.
//!
//! This crate provides:
//! - [`PdfDownloader`] / [`PageExtractor`] — the two fetch collaborators
//! - [`HttpPdfDownloader`] — direct PDF download with content-type check
//! - [`ExtractionClient`] — client for a page-extraction HTTP endpoint
//! - [`ContentFetcher`] — branches on content kind and isolates per-item failures

pub mod download;
pub mod extract;
pub mod fetcher;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harvester_shared::Result;
use url::Url;

pub use download::HttpPdfDownloader;
pub use extract::{ExtractionClient, ExtractionOptions};
pub use fetcher::ContentFetcher;

/// User-Agent string for fetch requests.
pub(crate) const USER_AGENT: &str = concat!("Harvester/", env!("CARGO_PKG_VERSION"));

/// Downloads a PDF into a directory.
#[async_trait]
pub trait PdfDownloader: Send + Sync {
    /// Download `url` into `dest_dir`.
    ///
    /// Returns `Ok(None)` when the response is not a PDF.
    async fn download(&self, url: &Url, dest_dir: &Path) -> Result<Option<PathBuf>>;
}

/// Extracts the main text of a web page.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Returns `Ok(None)` when the extractor reports it could not handle the page.
    async fn extract(&self, url: &Url) -> Result<Option<String>>;
}
