//! Academic search: the [`SearchProvider`] interface and a SerpAPI client.
//!
//! The pipeline only sees [`SearchProvider`]; [`SerpApiClient`] is the
//! implementation wired up by the CLI. It queries the Google Scholar engine
//! and maps `organic_results` onto [`RawHit`]s.

mod parser;

use std::time::Duration;

use async_trait::async_trait;
use harvester_shared::{HarvestError, RawHit, Result, SearchConfig};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Default timeout in seconds for a search request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("Harvester/", env!("CARGO_PKG_VERSION"));

/// Name used for this collaborator in errors and logs.
const SERVICE: &str = "search";

// ---------------------------------------------------------------------------
// SearchProvider
// ---------------------------------------------------------------------------

/// Anything that can turn a query into raw search hits.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query`, asking for up to `result_count` hits.
    ///
    /// Hits may lack a link; callers drop those.
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<RawHit>>;
}

// ---------------------------------------------------------------------------
// SerpApiClient
// ---------------------------------------------------------------------------

/// Configuration for the SerpAPI client.
#[derive(Debug, Clone)]
pub struct SerpApiOptions {
    /// Search endpoint (`https://serpapi.com/search.json`).
    pub endpoint: String,
    /// SerpAPI engine (`google_scholar`).
    pub engine: String,
    /// API key value.
    pub api_key: String,
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl SerpApiOptions {
    /// Build options from the `[search]` config section and a resolved key.
    pub fn from_config(config: &SearchConfig, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            engine: config.engine.clone(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// SerpAPI-backed [`SearchProvider`].
pub struct SerpApiClient {
    client: Client,
    endpoint: Url,
    engine: String,
    api_key: String,
}

impl SerpApiClient {
    /// Create a new client. Fails if the API key is empty or the endpoint is not a URL.
    pub fn new(opts: SerpApiOptions) -> Result<Self> {
        if opts.api_key.trim().is_empty() {
            return Err(HarvestError::config("search API key is empty"));
        }

        let endpoint = Url::parse(&opts.endpoint).map_err(|e| {
            HarvestError::config(format!("invalid search endpoint '{}': {e}", opts.endpoint))
        })?;

        Ok(Self {
            client: build_client(opts.timeout_secs)?,
            endpoint,
            engine: opts.engine,
            api_key: opts.api_key,
        })
    }

    /// Build the request URL for a query.
    fn request_url(&self, query: &str, result_count: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("engine", &self.engine)
            .append_pair("q", query)
            .append_pair("api_key", &self.api_key)
            .append_pair("num", &result_count.to_string());
        url
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    #[instrument(skip_all, fields(query = %query, result_count = result_count))]
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<RawHit>> {
        let url = self.request_url(query, result_count);
        debug!(endpoint = %self.endpoint, engine = %self.engine, "querying search provider");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                HarvestError::external(SERVICE, format!("request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::external(SERVICE, format!("HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| {
                HarvestError::external(SERVICE, format!("invalid JSON body: {}", e.without_url()))
            })?;

        let hits = parser::parse_organic_results(&body);

        if hits.is_empty() {
            if let Some(err) = body.get("error").and_then(|e| e.as_str()) {
                return Err(HarvestError::external(SERVICE, err.to_string()));
            }
            warn!("no organic results for query");
            return Ok(hits);
        }

        info!(results = hits.len(), "search returned results");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn opts(server: &MockServer) -> SerpApiOptions {
        SerpApiOptions {
            endpoint: format!("{}/search.json", server.uri()),
            engine: "google_scholar".into(),
            api_key: "test-key".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn empty_api_key_is_config_error() {
        let mut o = SerpApiOptions::from_config(&SearchConfig::default(), "");
        o.timeout_secs = 1;
        assert!(matches!(
            SerpApiClient::new(o),
            Err(HarvestError::Config { .. })
        ));
    }

    #[test]
    fn request_url_carries_parameters() {
        let o = SerpApiOptions::from_config(&SearchConfig::default(), "k");
        let client = SerpApiClient::new(o).unwrap();
        let url = client.request_url("rag evaluation", 10);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("engine".into(), "google_scholar".into())));
        assert!(pairs.contains(&("q".into(), "rag evaluation".into())));
        assert!(pairs.contains(&("num".into(), "10".into())));
    }

    #[tokio::test]
    async fn failed_request_does_not_leak_api_key() {
        let client = SerpApiClient::new(SerpApiOptions {
            endpoint: "http://127.0.0.1:9/search.json".into(),
            engine: "google_scholar".into(),
            api_key: "SUPER-SECRET-KEY".into(),
            timeout_secs: 2,
        })
        .unwrap();

        let err = client.search("rag", 10).await.unwrap_err().to_string();
        assert!(err.contains("request failed"), "unexpected error: {err}");
        assert!(!err.contains("SUPER-SECRET-KEY"), "key leaked: {err}");
    }

    #[tokio::test]
    async fn invalid_json_does_not_leak_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = SerpApiClient::new(opts(&server))
            .unwrap()
            .search("rag", 10)
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid JSON body"), "unexpected error: {err}");
        assert!(!err.contains("test-key"), "key leaked: {err}");
    }

    #[tokio::test]
    async fn search_with_mock_server() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "organic_results": [
                {
                    "title": "RAG evaluation survey",
                    "link": "https://arxiv.org/pdf/2405.07437.pdf",
                    "snippet": "A survey of RAG evaluation",
                    "publication_info": { "summary": "H Yu - arXiv preprint, 2024 - arxiv.org" },
                    "inline_links": { "cited_by": { "total": 42 } }
                },
                { "title": "No link here" }
            ]
        });

        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "RAG evaluation"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = SerpApiClient::new(opts(&server)).unwrap();
        let hits = client.search("RAG evaluation", 10).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source.as_deref(), Some("arxiv.org"));
        assert_eq!(hits[0].cited_by, Some(42));
        assert!(hits[1].link.is_none());
    }

    #[tokio::test]
    async fn provider_error_is_external_call_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "Invalid API key." })),
            )
            .mount(&server)
            .await;

        let client = SerpApiClient::new(opts(&server)).unwrap();
        let err = client.search("anything", 10).await.unwrap_err();
        assert!(matches!(err, HarvestError::ExternalCall { .. }));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn empty_results_without_error_is_ok() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "organic_results": [] })),
            )
            .mount(&server)
            .await;

        let client = SerpApiClient::new(opts(&server)).unwrap();
        assert!(client.search("obscure", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_failure_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = SerpApiClient::new(opts(&server)).unwrap();
        let err = client.search("anything", 10).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
