//! Persist stage: upload each document's body and record its link.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{NamedTempFile, TempDir};
use tracing::{info, instrument, warn};

use harvester_shared::{Document, HarvestError, Result, RetryPolicy};

use crate::{ObjectStore, storage_key};

/// Output of one persist batch.
#[derive(Debug, Default)]
pub struct PersistOutput {
    /// Every input document, in input order; uploaded ones carry a link.
    pub documents: Vec<Document>,
    /// Links of successful uploads, in input order.
    pub links: Vec<String>,
    /// One message per document that did not get a link.
    pub errors: Vec<String>,
}

/// Writes document bodies to scratch files and uploads them.
pub struct Persister {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    retry: RetryPolicy,
    scratch_root: Option<PathBuf>,
}

impl Persister {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            retry,
            scratch_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    /// Upload every document under `base_path`.
    ///
    /// Never fails as a whole: a document whose upload fails keeps a null
    /// link and contributes one entry to `errors`. The scratch directory is
    /// removed before returning.
    #[instrument(skip_all, fields(documents = documents.len(), base_path = %base_path))]
    pub async fn persist(&self, mut documents: Vec<Document>, base_path: &str) -> PersistOutput {
        let scratch = match self.scratch_dir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "cannot create upload scratch directory");
                let errors = documents
                    .iter()
                    .map(|doc| format!("failed to upload {}: {e}", doc.source_url))
                    .collect();
                return PersistOutput {
                    documents,
                    links: Vec::new(),
                    errors,
                };
            }
        };

        let mut links = Vec::new();
        let mut errors = Vec::new();

        for doc in &mut documents {
            let key = storage_key(base_path, &doc.source_url);
            match self.persist_one(doc, scratch.path(), &key).await {
                Ok(link) => {
                    doc.storage_link = Some(link.clone());
                    links.push(link);
                }
                Err(e) => {
                    warn!(url = %doc.source_url, %key, error = %e, "upload failed");
                    errors.push(format!("failed to upload {}: {e}", doc.source_url));
                }
            }
        }

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = %scratch_path.display(), error = %e, "failed to remove upload scratch directory");
        }

        info!(
            uploaded = links.len(),
            failed = errors.len(),
            "persist complete"
        );

        PersistOutput {
            documents,
            links,
            errors,
        }
    }

    async fn persist_one(&self, doc: &Document, scratch: &Path, key: &str) -> Result<String> {
        // Removed when dropped, whichever way this function returns.
        let body_file = write_body(scratch, &doc.body_text).await?;

        let link = self
            .retry
            .run("upload", || {
                self.store.upload(&self.bucket, body_file.path(), key)
            })
            .await?;

        link.ok_or_else(|| HarvestError::external("upload", "store returned no link"))
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("harvester-upload-");
        match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| HarvestError::io(root, e))?;
                builder.tempdir_in(root).map_err(|e| HarvestError::io(root, e))
            }
            None => builder
                .tempdir()
                .map_err(|e| HarvestError::io(std::env::temp_dir(), e)),
        }
    }
}

async fn write_body(scratch: &Path, body: &str) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .suffix(".md")
        .tempfile_in(scratch)
        .map_err(|e| HarvestError::io(scratch, e))?;
    tokio::fs::write(file.path(), body.as_bytes())
        .await
        .map_err(|e| HarvestError::io(file.path(), e))?;
    Ok(file)
}
