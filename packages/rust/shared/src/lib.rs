//! Shared types, error model, and configuration for Harvester.
//!
//! This crate is the foundation depended on by all other Harvester crates.
//! It provides:
//! - [`HarvestError`] — the unified error type
//! - Domain types ([`SearchCandidate`], [`FetchedContent`], [`Document`], [`RunError`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)
//! - [`RetryPolicy`] for collaborator calls

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExtractionConfig, PipelineConfig, PipelineSection, SearchConfig, StorageBackend,
    StorageConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_key, validate_bucket,
};
pub use error::{HarvestError, Result};
pub use retry::RetryPolicy;
pub use types::{
    ContentKind, Document, FetchOutcome, FetchedContent, RawHit, RunError, RunId,
    SearchCandidate, Stage,
};
