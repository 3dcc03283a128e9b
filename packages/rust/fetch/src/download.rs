//! Direct PDF download over HTTP.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use harvester_shared::{HarvestError, Result};

use crate::{PdfDownloader, USER_AGENT};

/// Name used for this collaborator in errors and logs.
const SERVICE: &str = "download";

/// Longest file stem kept from the URL.
const MAX_STEM_LEN: usize = 80;

/// [`PdfDownloader`] that fetches the URL directly and keeps PDF responses only.
pub struct HttpPdfDownloader {
    client: Client,
}

impl HttpPdfDownloader {
    /// Create a downloader with a 30 s timeout and up to 5 redirects.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PdfDownloader for HttpPdfDownloader {
    #[instrument(skip_all, fields(url = %url))]
    async fn download(&self, url: &Url, dest_dir: &Path) -> Result<Option<PathBuf>> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| HarvestError::io(dest_dir, e))?;

        debug!("downloading PDF");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| HarvestError::external(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::external(
                SERVICE,
                format!("{url}: HTTP {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if !is_pdf_content_type(&content_type) {
            warn!(%content_type, "response is not a PDF, skipping");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HarvestError::external(SERVICE, format!("{url}: body read failed: {e}")))?;

        let path = dest_dir.join(pdf_file_name(url));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| HarvestError::io(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), "PDF downloaded");
        Ok(Some(path))
    }
}

/// `application/pdf`, `application/x-pdf` and friends.
fn is_pdf_content_type(content_type: &str) -> bool {
    content_type.contains("pdf")
}

/// Local file name for a PDF URL: a short URL hash, then the sanitized last
/// path segment, always ending in `.pdf`.
///
/// The hash keeps names unique inside a scratch directory shared by every
/// candidate of a topic.
pub fn pdf_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let mut stem: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    if stem.is_empty() {
        stem.push_str("document");
    }
    if !stem.to_ascii_lowercase().ends_with(".pdf") {
        stem.push_str(".pdf");
    }

    let digest = Sha256::digest(url.as_str().as_bytes());
    let prefix: String = format!("{digest:x}").chars().take(8).collect();

    format!("{prefix}_{stem}")
}
