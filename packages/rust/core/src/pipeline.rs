//! End-to-end harvest run: topics → search → rank → fetch → convert → persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use harvester_fetch::{
    ContentFetcher, ExtractionClient, ExtractionOptions, HttpPdfDownloader, PageExtractor,
    PdfDownloader,
};
use harvester_markdown::{MarkdownConverter, TextConverter};
use harvester_search::{SearchProvider, SerpApiClient, SerpApiOptions};
use harvester_shared::{
    AppConfig, Document, FetchedContent, HarvestError, PipelineConfig, Result, RunError, RunId,
    SearchCandidate, Stage, StorageBackend, validate_api_key,
};
use harvester_storage::{GcsStore, LocalStore, ObjectStore, Persister};

use crate::convert::{ContentConverter, Conversion};
use crate::ranker::Ranker;
use crate::state::{Continuation, RunState};

/// The external services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn SearchProvider>,
    pub downloader: Arc<dyn PdfDownloader>,
    pub extractor: Arc<dyn PageExtractor>,
    pub converter: Arc<dyn TextConverter>,
    pub store: Arc<dyn ObjectStore>,
}

impl Collaborators {
    /// Build the production collaborators from config.
    ///
    /// `local_store` forces a [`LocalStore`] rooted there, whatever the
    /// configured backend.
    pub fn from_config(config: &AppConfig, local_store: Option<PathBuf>) -> Result<Self> {
        let api_key = validate_api_key(config)?;
        let search = SerpApiClient::new(SerpApiOptions::from_config(&config.search, api_key))?;
        let extractor = ExtractionClient::new(ExtractionOptions::from(&config.extraction))?;

        let store: Arc<dyn ObjectStore> = match (local_store, config.storage.backend) {
            (Some(root), _) => Arc::new(LocalStore::new(root)),
            (None, StorageBackend::Local) => Arc::new(LocalStore::new(&config.storage.local_root)),
            (None, StorageBackend::Gcs) => Arc::new(GcsStore::from_config(&config.storage)?),
        };

        Ok(Self {
            search: Arc::new(search),
            downloader: Arc::new(HttpPdfDownloader::new()?),
            extractor: Arc::new(extractor),
            converter: Arc::new(MarkdownConverter::new()),
            store,
        })
    }
}

/// Everything a finished run produced.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: RunId,
    pub documents: Vec<Document>,
    pub storage_links: Vec<String>,
    pub errors: Vec<RunError>,
    pub topics_processed: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a topic starts (`index` is zero-based).
    fn topic_started(&self, topic: &str, index: usize, total: usize);
    /// Called when entering a per-topic stage.
    fn stage(&self, topic: &str, stage: Stage);
    /// Called after a topic's documents were persisted.
    fn topic_finished(&self, topic: &str, documents: usize, links: usize);
    /// Called when the run completes.
    fn done(&self, output: &RunOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn topic_started(&self, _topic: &str, _index: usize, _total: usize) {}
    fn stage(&self, _topic: &str, _stage: Stage) {}
    fn topic_finished(&self, _topic: &str, _documents: usize, _links: usize) {}
    fn done(&self, _output: &RunOutput) {}
}

/// The per-topic state machine.
pub struct Pipeline {
    config: PipelineConfig,
    search: Arc<dyn SearchProvider>,
    ranker: Ranker,
    fetcher: ContentFetcher,
    converter: ContentConverter,
    persister: Persister,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let retry = config.retry;
        Self {
            search: collaborators.search,
            ranker: Ranker::new(),
            fetcher: ContentFetcher::new(collaborators.downloader, collaborators.extractor, retry),
            converter: ContentConverter::new(collaborators.converter, retry),
            persister: Persister::new(collaborators.store, config.bucket.clone(), retry)
                .with_scratch_root(config.scratch_root.clone()),
            config,
        }
    }

    /// Replace the ranker (fixed year for reproducible runs).
    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    /// Process every topic in order and return the accumulated results.
    ///
    /// Never fails: per-item and per-stage failures end up in
    /// [`RunOutput::errors`].
    #[instrument(skip_all, fields(topics = topics.len()))]
    pub async fn run(&self, topics: Vec<String>, progress: &dyn ProgressReporter) -> RunOutput {
        let start = Instant::now();
        let run_id = RunId::new();
        info!(%run_id, top_n = self.config.top_n, "starting harvest run");

        let mut state = RunState::new(topics);
        let mut stage = Stage::PrepareTopic;
        while stage != Stage::Done {
            stage = self.step(stage, &mut state, progress).await;
        }

        let topics_processed = state.current_index().map_or(0, |i| i + 1);
        let (documents, storage_links, errors) = state.into_results();
        let output = RunOutput {
            run_id,
            documents,
            storage_links,
            errors,
            topics_processed,
            elapsed: start.elapsed(),
        };

        info!(
            run_id = %output.run_id,
            documents = output.documents.len(),
            links = output.storage_links.len(),
            errors = output.errors.len(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "harvest run complete"
        );
        progress.done(&output);
        output
    }

    /// Execute one stage and return the next one.
    pub async fn step(
        &self,
        stage: Stage,
        state: &mut RunState,
        progress: &dyn ProgressReporter,
    ) -> Stage {
        let topic = state.current_topic().unwrap_or_default().to_string();
        if !matches!(stage, Stage::PrepareTopic | Stage::Done) {
            progress.stage(&topic, stage);
        }

        let span = info_span!("stage", stage = %stage, topic = %topic);
        match stage {
            Stage::PrepareTopic => {
                if !state.advance() {
                    return Stage::Done;
                }
                let index = state.current_index().unwrap_or_default();
                let topic = state.current_topic().unwrap_or_default();
                info!(index, total = state.topics().len(), %topic, "processing topic");
                progress.topic_started(topic, index, state.topics().len());
                Stage::Search
            }
            Stage::Search => {
                self.search_stage(state).instrument(span).await;
                Stage::Rank
            }
            Stage::Rank => {
                span.in_scope(|| self.rank_stage(state));
                Stage::Fetch
            }
            Stage::Fetch => {
                self.fetch_stage(state).instrument(span).await;
                Stage::Convert
            }
            Stage::Convert => {
                self.convert_stage(state).instrument(span).await;
                Stage::Persist
            }
            Stage::Persist => {
                self.persist_stage(state).instrument(span).await;
                progress.topic_finished(
                    &topic,
                    state.topic_documents.len(),
                    state
                        .topic_documents
                        .iter()
                        .filter(|d| d.storage_link.is_some())
                        .count(),
                );
                match state.should_continue() {
                    Continuation::Continue => Stage::PrepareTopic,
                    Continuation::End => {
                        state.download_dir = None;
                        Stage::Done
                    }
                }
            }
            Stage::Done => Stage::Done,
        }
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn search_stage(&self, state: &mut RunState) {
        let Some(topic) = state
            .current_topic()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
        else {
            warn!("topic is blank, skipping search");
            state.record_error(Stage::Search, HarvestError::missing("topic").to_string());
            return;
        };

        let result = self
            .config
            .retry
            .run("search", || {
                self.search.search(&topic, self.config.search_results)
            })
            .await;

        match result {
            Ok(hits) => {
                let total = hits.len();
                state.candidates = hits
                    .into_iter()
                    .filter_map(|hit| match SearchCandidate::try_from(hit) {
                        Ok(candidate) => Some(candidate),
                        Err(e) => {
                            debug!(error = %e, "dropping search hit");
                            None
                        }
                    })
                    .collect();
                info!(hits = total, candidates = state.candidates.len(), "search complete");
            }
            Err(e) => {
                warn!(error = %e, "search failed");
                state.record_error(Stage::Search, e.to_string());
            }
        }
    }

    fn rank_stage(&self, state: &mut RunState) {
        let topic = state.current_topic().unwrap_or_default().to_string();
        state.ranked = self
            .ranker
            .rank(state.candidates.clone(), &topic, self.config.top_n);
        info!(selected = state.ranked.len(), "ranking complete");
    }

    async fn fetch_stage(&self, state: &mut RunState) {
        if state.ranked.is_empty() {
            return;
        }

        let scratch = match scratch_dir(self.config.scratch_root.as_deref(), "harvester-download-")
        {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "cannot create download scratch directory");
                state.fetched = state
                    .ranked
                    .iter()
                    .map(|c| FetchedContent::failed(c.clone(), None, e.to_string()))
                    .collect();
                record_fetch_failures(state);
                return;
            }
        };

        state.fetched = self.fetcher.fetch_all(&state.ranked, scratch.path()).await;
        state.download_dir = Some(scratch);
        record_fetch_failures(state);
    }

    async fn convert_stage(&self, state: &mut RunState) {
        let mut outcomes = Vec::with_capacity(state.fetched.len());
        for fetched in &state.fetched {
            outcomes.push(self.converter.convert(fetched).await);
        }

        for outcome in outcomes {
            match outcome {
                Conversion::Converted(doc) => state.push_document(doc),
                Conversion::Failed(message) => state.record_error(Stage::Convert, message),
                Conversion::Skipped => {}
            }
        }
        info!(documents = state.topic_documents.len(), "conversion complete");
    }

    async fn persist_stage(&self, state: &mut RunState) {
        if state.topic_documents.is_empty() {
            return;
        }

        let topic = state.current_topic().unwrap_or_default();
        let base_path = topic_base_path(&self.config.base_path, topic);

        let output = self
            .persister
            .persist(state.topic_documents.clone(), &base_path)
            .await;

        for message in output.errors {
            state.record_error(Stage::Persist, message);
        }
        state.merge_persisted(output.documents, output.links);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record_fetch_failures(state: &mut RunState) {
    let failures: Vec<String> = state
        .fetched
        .iter()
        .filter_map(|f| {
            f.error_message()
                .map(|message| format!("{}: {message}", f.source_url()))
        })
        .collect();
    for message in failures {
        state.record_error(Stage::Fetch, message);
    }
}

fn scratch_dir(root: Option<&Path>, prefix: &str) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match root {
        Some(root) => {
            std::fs::create_dir_all(root).map_err(|e| HarvestError::io(root, e))?;
            builder.tempdir_in(root).map_err(|e| HarvestError::io(root, e))
        }
        None => builder
            .tempdir()
            .map_err(|e| HarvestError::io(std::env::temp_dir(), e)),
    }
}

/// `<base>/<slug>` where the slug is the lowercased topic with every run of
/// non-alphanumeric characters replaced by a single `_`.
pub fn topic_base_path(base_path: &str, topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    for c in topic.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "untitled" } else { slug };

    match base_path.trim_end_matches('/') {
        "" => slug.to_string(),
        base => format!("{base}/{slug}"),
    }
}
