//! Object storage for converted documents.
//!
//! [`ObjectStore`] is the upload collaborator. [`GcsStore`] talks to Google
//! Cloud Storage's JSON API; [`LocalStore`] mirrors the same layout on disk
//! for offline runs. [`Persister`] drives uploads for a batch of documents.

mod gcs;
mod local;
mod persister;

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use url::Url;

use harvester_shared::Result;

pub use gcs::GcsStore;
pub use local::LocalStore;
pub use persister::{PersistOutput, Persister};

/// Longest run of sanitized URL characters kept in a key.
const MAX_KEY_URL_LEN: usize = 100;

/// Hex characters of the URL hash appended to every key.
const KEY_HASH_LEN: usize = 16;

/// Uploads a local file under a key and hands back its public link.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` means the store accepted the call but produced no link.
    async fn upload(&self, bucket: &str, local_file: &Path, key: &str) -> Result<Option<String>>;
}

/// Storage key for a document fetched from `url`:
/// `<base>/<sanitized-url>_<hash>.md`.
///
/// The sanitized part keeps `[A-Za-z0-9_.-]` and maps everything else to
/// `_`, truncated to 100 characters; the hash is the first 16 hex digits of
/// the URL's SHA-256, so distinct URLs never share a key.
pub fn storage_key(base_path: &str, url: &Url) -> String {
    let sanitized: String = url
        .as_str()
        .chars()
        .take(MAX_KEY_URL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let digest = format!("{:x}", Sha256::digest(url.as_str().as_bytes()));
    let hash = &digest[..KEY_HASH_LEN];

    match base_path.trim_matches('/') {
        "" => format!("{sanitized}_{hash}.md"),
        base => format!("{base}/{sanitized}_{hash}.md"),
    }
}
