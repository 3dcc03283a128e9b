//! Fetch stage: turn ranked candidates into [`FetchedContent`] items.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, instrument, warn};

use harvester_shared::{ContentKind, FetchedContent, RetryPolicy, SearchCandidate};

use crate::{PageExtractor, PdfDownloader};

/// Fetches each candidate with the collaborator matching its content kind.
///
/// Every candidate yields exactly one [`FetchedContent`]; failures are
/// recorded on the item rather than returned.
pub struct ContentFetcher {
    downloader: Arc<dyn PdfDownloader>,
    extractor: Arc<dyn PageExtractor>,
    retry: RetryPolicy,
}

impl ContentFetcher {
    pub fn new(
        downloader: Arc<dyn PdfDownloader>,
        extractor: Arc<dyn PageExtractor>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            downloader,
            extractor,
            retry,
        }
    }

    /// Fetch every candidate. Output order matches input order.
    ///
    /// Fetches run concurrently on the calling task; PDFs are written into
    /// `scratch_dir`.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn fetch_all(
        &self,
        candidates: &[SearchCandidate],
        scratch_dir: &Path,
    ) -> Vec<FetchedContent> {
        let fetched = join_all(
            candidates
                .iter()
                .cloned()
                .map(|candidate| self.fetch_one(candidate, scratch_dir)),
        )
        .await;

        let succeeded = fetched.iter().filter(|f| f.is_success()).count();
        info!(
            succeeded,
            failed = fetched.len() - succeeded,
            "fetch complete"
        );
        fetched
    }

    /// Fetch a single candidate. Never fails; errors end up on the item.
    pub async fn fetch_one(&self, candidate: SearchCandidate, scratch_dir: &Path) -> FetchedContent {
        let url = candidate.link.clone();

        let kind = ContentKind::from_url(&url);
        let fetched = match kind {
            ContentKind::Unknown => FetchedContent::failed(
                candidate,
                Some(kind),
                format!("unsupported URL scheme '{}'", url.scheme()),
            ),
            ContentKind::Pdf => {
                let result = self
                    .retry
                    .run("download", || self.downloader.download(&url, scratch_dir))
                    .await;
                match result {
                    Ok(Some(path)) => {
                        if file_exists(&path).await {
                            FetchedContent::with_file(candidate, path)
                        } else {
                            FetchedContent::failed(
                                candidate,
                                Some(kind),
                                format!("downloaded file missing: {}", path.display()),
                            )
                        }
                    }
                    Ok(None) => FetchedContent::failed(
                        candidate,
                        Some(kind),
                        format!("failed to download PDF from {url}"),
                    ),
                    Err(e) => FetchedContent::failed(candidate, Some(kind), e.to_string()),
                }
            }
            ContentKind::Html => {
                let result = self
                    .retry
                    .run("extract", || self.extractor.extract(&url))
                    .await;
                match result {
                    Ok(Some(text)) if !text.trim().is_empty() => {
                        FetchedContent::with_text(candidate, text)
                    }
                    Ok(_) => FetchedContent::failed(
                        candidate,
                        Some(ContentKind::Html),
                        format!("failed to extract content from {url}"),
                    ),
                    Err(e) => {
                        FetchedContent::failed(candidate, Some(ContentKind::Html), e.to_string())
                    }
                }
            }
        };

        if let Some(error) = fetched.error_message() {
            warn!(%url, kind = %fetched.kind(), %error, "fetch failed");
        }
        fetched
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
