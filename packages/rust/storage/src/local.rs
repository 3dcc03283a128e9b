use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use harvester_shared::{HarvestError, Result};

use crate::ObjectStore;

/// Filesystem-backed [`ObjectStore`]: objects land at `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let mut path = self.root.join(bucket);
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(HarvestError::validation(format!(
                    "storage key '{key}' escapes the bucket"
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    #[instrument(skip_all, fields(bucket = %bucket, key = %key))]
    async fn upload(&self, bucket: &str, local_file: &Path, key: &str) -> Result<Option<String>> {
        let dest = self.object_path(bucket, key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::io(parent, e))?;
        }

        tokio::fs::copy(local_file, &dest)
            .await
            .map_err(|e| HarvestError::io(&dest, e))?;

        let absolute = std::path::absolute(&dest).map_err(|e| HarvestError::io(&dest, e))?;
        let link = Url::from_file_path(&absolute)
            .map_err(|()| HarvestError::Storage(format!("not a file URL: {}", absolute.display())))?;

        debug!(path = %dest.display(), "stored locally");
        Ok(Some(link.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_into_bucket_layout() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let file = scratch.path().join("body.md");
        std::fs::write(&file, "# Paper\n").unwrap();

        let store = LocalStore::new(root.path());
        let link = store
            .upload("bucket", &file, "base/topic/doc.md")
            .await
            .unwrap()
            .unwrap();

        let stored = root.path().join("bucket/base/topic/doc.md");
        assert_eq!(std::fs::read_to_string(&stored).unwrap(), "# Paper\n");
        assert!(link.starts_with("file://"));
        assert!(link.ends_with("/bucket/base/topic/doc.md"));
    }

    #[tokio::test]
    async fn rejects_parent_segments() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("x.md");
        std::fs::write(&file, "x").unwrap();

        let err = LocalStore::new(root.path())
            .upload("bucket", &file, "../outside.md")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_source_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let err = LocalStore::new(root.path())
            .upload("bucket", &root.path().join("absent.md"), "k.md")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Io { .. }));
    }
}
