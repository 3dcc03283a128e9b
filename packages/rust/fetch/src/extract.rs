//! Client for the page-extraction endpoint.
//!
//! The endpoint takes `{"url": ...}` and answers with
//! `{"status": "success", "content": "..."}` or
//! `{"status": "error", "error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use harvester_shared::{ExtractionConfig, HarvestError, Result};

use crate::{PageExtractor, USER_AGENT};

const SERVICE: &str = "extraction";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl From<&ExtractionConfig> for ExtractionOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`PageExtractor`] backed by an HTTP extraction service.
pub struct ExtractionClient {
    client: Client,
    endpoint: Url,
}

impl ExtractionClient {
    pub fn new(opts: ExtractionOptions) -> Result<Self> {
        let endpoint = Url::parse(&opts.endpoint).map_err(|e| {
            HarvestError::config(format!(
                "invalid extraction endpoint '{}': {e}",
                opts.endpoint
            ))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PageExtractor for ExtractionClient {
    #[instrument(skip_all, fields(url = %url))]
    async fn extract(&self, url: &Url) -> Result<Option<String>> {
        debug!(endpoint = %self.endpoint, "requesting page extraction");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ExtractRequest { url: url.as_str() })
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

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::external(SERVICE, format!("invalid JSON body: {e}")))?;

        if body.status == "success" {
            if let Some(content) = body.content {
                return Ok(Some(content));
            }
        }

        warn!(
            status = %body.status,
            error = body.error.as_deref().unwrap_or("no error given"),
            "extraction endpoint could not handle page"
        );
        Ok(None)
    }
}
