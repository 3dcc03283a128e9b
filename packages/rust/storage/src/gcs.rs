use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument};
use url::Url;

use harvester_shared::{HarvestError, Result, StorageConfig};

use crate::ObjectStore;

const SERVICE: &str = "upload";

const USER_AGENT: &str = concat!("Harvester/", env!("CARGO_PKG_VERSION"));

/// JSON API root and public object host.
const GCS_BASE: &str = "https://storage.googleapis.com";

/// Google Cloud Storage media uploads.
pub struct GcsStore {
    client: Client,
    api_base: Url,
    token: Option<String>,
}

impl GcsStore {
    /// Store authenticating with `token` as a bearer token, if given.
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: parse_base(GCS_BASE)?,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Read the access token from the env var named in `[storage] token_env`.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).ok();
        if token.is_none() {
            debug!(env = %config.token_env, "no storage access token set, uploading anonymously");
        }
        Self::new(token)
    }

    /// Point uploads at a different API root (emulators, tests).
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self> {
        self.api_base = parse_base(api_base)?;
        Ok(self)
    }

    fn upload_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| HarvestError::config(format!("invalid storage API base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["upload", "storage", "v1", "b", bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }
}

fn parse_base(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| HarvestError::config(format!("invalid storage API base '{base}': {e}")))
}

/// Public link for an object.
fn public_url(bucket: &str, key: &str) -> String {
    format!("{GCS_BASE}/{bucket}/{key}")
}

#[async_trait]
impl ObjectStore for GcsStore {
    #[instrument(skip_all, fields(bucket = %bucket, key = %key))]
    async fn upload(&self, bucket: &str, local_file: &Path, key: &str) -> Result<Option<String>> {
        let body = tokio::fs::read(local_file)
            .await
            .map_err(|e| HarvestError::io(local_file, e))?;

        let mut request = self
            .client
            .post(self.upload_url(bucket, key)?)
            .header(CONTENT_TYPE, "text/markdown; charset=utf-8")
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HarvestError::external(SERVICE, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(HarvestError::external(
                SERVICE,
                format!("HTTP {status}: {}", detail.trim()),
            ));
        }

        let link = public_url(bucket, key);
        info!(%link, "uploaded");
        Ok(Some(link))
    }
}
