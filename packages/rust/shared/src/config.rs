//! Application configuration for Harvester.
//!
//! User config lives at `~/.harvester/harvester.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file: it names the environment
//! variables that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "harvester.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".harvester";

// ---------------------------------------------------------------------------
// Config structs (matching harvester.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Page-extraction endpoint settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ranking, fetch and retry settings.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Research topics processed when none are given on the command line.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            extraction: ExtractionConfig::default(),
            storage: StorageConfig::default(),
            pipeline: PipelineSection::default(),
            topics: default_topics(),
        }
    }
}

fn default_topics() -> Vec<String> {
    [
        "Reference-free RAG evaluation metrics",
        "Techniques for evaluating RAG faithfulness",
        "Assessing RAG relevance without ground truth",
        "LLM hallucination detection in RAG",
        "Evaluating RAG context augmentation effectiveness",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the SerpAPI key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Search endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// SerpAPI engine.
    #[serde(default = "default_search_engine")]
    pub engine: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            endpoint: default_search_endpoint(),
            engine: default_search_engine(),
        }
    }
}

fn default_search_key_env() -> String {
    "SERPAPI_API_KEY".into()
}
fn default_search_endpoint() -> String {
    "https://serpapi.com/search.json".into()
}
fn default_search_engine() -> String {
    "google_scholar".into()
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Endpoint accepting `{"url": ...}` and returning `{status, content|error}`.
    #[serde(default = "default_extraction_endpoint")]
    pub endpoint: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_extraction_endpoint(),
        }
    }
}

fn default_extraction_endpoint() -> String {
    "http://localhost:8070/extract".into()
}

/// Which object store receives the persisted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Gcs,
    Local,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Bucket name. Falls back to the `bucket_env` variable when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default = "default_bucket_env")]
    pub bucket_env: String,

    /// Cloud project, for stores that need one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Name of the env var holding a bearer token for uploads.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Prefix for every storage key.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Root directory for the local backend.
    #[serde(default = "default_local_root")]
    pub local_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: None,
            bucket_env: default_bucket_env(),
            project: None,
            token_env: default_token_env(),
            base_path: default_base_path(),
            local_root: default_local_root(),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Gcs
}
fn default_bucket_env() -> String {
    "GCS_BUCKET_NAME".into()
}
fn default_token_env() -> String {
    "GCS_ACCESS_TOKEN".into()
}
fn default_base_path() -> String {
    "research_dataset/phase1".into()
}
fn default_local_root() -> String {
    "var/objects".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Candidates kept per topic after ranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Search asks for `top_n * search_multiplier` hits to rank from.
    #[serde(default = "default_search_multiplier")]
    pub search_multiplier: usize,

    /// Extra attempts per failed collaborator call. 0 disables retries.
    #[serde(default)]
    pub max_retries: u32,

    /// Delay before each retry, doubled per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Root for scratch directories (system temp dir when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            search_multiplier: default_search_multiplier(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            scratch_dir: None,
        }
    }
}

fn default_top_n() -> usize {
    5
}
fn default_search_multiplier() -> usize {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidates kept per topic after ranking.
    pub top_n: usize,
    /// Hits requested from the search provider per topic.
    pub search_results: usize,
    /// Retry policy applied to every collaborator call.
    pub retry: RetryPolicy,
    /// Bucket passed to the object store.
    pub bucket: String,
    /// Prefix for storage keys; the topic slug is appended per topic.
    pub base_path: String,
    /// Root for scratch directories.
    pub scratch_root: Option<PathBuf>,
}

impl PipelineConfig {
    /// Override `top_n`, keeping the configured search multiplier ratio.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        let multiplier = (self.search_results / self.top_n.max(1)).max(1);
        self.top_n = top_n;
        self.search_results = top_n.saturating_mul(multiplier);
        self
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        let pipeline = &config.pipeline;
        Self {
            top_n: pipeline.top_n,
            search_results: pipeline
                .top_n
                .saturating_mul(pipeline.search_multiplier.max(1)),
            retry: RetryPolicy::new(
                pipeline.max_retries,
                Duration::from_millis(pipeline.retry_backoff_ms),
            ),
            bucket: config.storage.resolve_bucket().unwrap_or_default(),
            base_path: config.storage.base_path.clone(),
            scratch_root: pipeline.scratch_dir.as_ref().map(PathBuf::from),
        }
    }
}

impl StorageConfig {
    /// The configured bucket, or the value of `bucket_env`.
    pub fn resolve_bucket(&self) -> Option<String> {
        self.bucket
            .clone()
            .filter(|b| !b.is_empty())
            .or_else(|| std::env::var(&self.bucket_env).ok().filter(|b| !b.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.harvester/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.harvester/harvester.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the search API key env var is set and non-empty, returning it.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.search.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(HarvestError::config(format!(
            "search API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://serpapi.com/manage-api-key"
        ))),
    }
}

/// Check that a bucket is configured for the object store, returning it.
pub fn validate_bucket(config: &AppConfig) -> Result<String> {
    config.storage.resolve_bucket().ok_or_else(|| {
        HarvestError::config(format!(
            "no storage bucket configured. Set storage.bucket or the {} environment variable.",
            config.storage.bucket_env
        ))
    })
}
