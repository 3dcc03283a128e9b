//! Core domain types for a Harvester run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{HarvestError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// RawHit / SearchCandidate
// ---------------------------------------------------------------------------

/// One hit as returned by a search provider, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHit {
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
    pub source: Option<String>,
    pub publication_date: Option<String>,
    /// Citation count, if the provider reports one.
    pub cited_by: Option<u64>,
    /// The provider's payload for this hit, kept verbatim.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// A validated search hit, ready for ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub link: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date_str: Option<String>,
    /// `None` means the count is unknown, which is not the same as zero.
    #[serde(default)]
    pub citation_count: Option<u64>,
    #[serde(default)]
    pub raw_payload: serde_json::Value,
    /// Set once by the ranker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

impl SearchCandidate {
    /// Build a candidate around a link with every optional field empty.
    pub fn new(link: Url) -> Self {
        Self {
            title: None,
            link,
            snippet: None,
            source_name: None,
            publication_date_str: None,
            citation_count: None,
            raw_payload: serde_json::Value::Null,
            quality_score: None,
        }
    }
}

impl TryFrom<RawHit> for SearchCandidate {
    type Error = HarvestError;

    fn try_from(hit: RawHit) -> Result<Self> {
        let link = hit
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| HarvestError::missing("candidate link"))?;

        let link = Url::parse(link)
            .map_err(|e| HarvestError::validation(format!("invalid link '{link}': {e}")))?;

        Ok(Self {
            title: hit.title,
            link,
            snippet: hit.snippet,
            source_name: hit.source,
            publication_date_str: hit.publication_date,
            citation_count: hit.cited_by,
            raw_payload: hit.raw,
            quality_score: None,
        })
    }
}

// ---------------------------------------------------------------------------
// ContentKind / FetchedContent
// ---------------------------------------------------------------------------

/// How a candidate's full content is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Html,
    Unknown,
}

impl ContentKind {
    /// Classify by URL shape. Non-http(s) schemes are `Unknown`; otherwise a
    /// case-insensitive `.pdf` ending is a PDF and everything else a web page.
    pub fn from_url(url: &Url) -> Self {
        if !matches!(url.scheme(), "http" | "https") {
            Self::Unknown
        } else if url.as_str().to_ascii_lowercase().ends_with(".pdf") {
            Self::Pdf
        } else {
            Self::Html
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a fetch attempt. A successful fetch carries exactly one of a
/// local file or raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    LocalFile(PathBuf),
    RawText(String),
    Failed { error: String },
}

/// Result of fetching one ranked candidate. Immutable once built.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    source_url: Url,
    candidate: SearchCandidate,
    kind: ContentKind,
    outcome: FetchOutcome,
}

impl FetchedContent {
    /// A PDF that now exists on local disk.
    pub fn with_file(candidate: SearchCandidate, path: PathBuf) -> Self {
        Self {
            source_url: candidate.link.clone(),
            candidate,
            kind: ContentKind::Pdf,
            outcome: FetchOutcome::LocalFile(path),
        }
    }

    /// Page text returned by the extraction endpoint.
    pub fn with_text(candidate: SearchCandidate, text: String) -> Self {
        Self {
            source_url: candidate.link.clone(),
            candidate,
            kind: ContentKind::Html,
            outcome: FetchOutcome::RawText(text),
        }
    }

    /// A failed fetch. `kind` is `None` when the failure happened before
    /// classification, in which case the kind is recorded as unknown.
    pub fn failed(
        candidate: SearchCandidate,
        kind: Option<ContentKind>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source_url: candidate.link.clone(),
            candidate,
            kind: kind.unwrap_or(ContentKind::Unknown),
            outcome: FetchOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    pub fn candidate(&self) -> &SearchCandidate {
        &self.candidate
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn outcome(&self) -> &FetchOutcome {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, FetchOutcome::Failed { .. })
    }

    pub fn local_file_ref(&self) -> Option<&Path> {
        match &self.outcome {
            FetchOutcome::LocalFile(path) => Some(path),
            _ => None,
        }
    }

    pub fn raw_text(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::RawText(text) => Some(text),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A normalized research document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_url: Url,
    pub candidate: SearchCandidate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Author extraction is not implemented; always `None` for now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub body_text: String,
    /// Public link of the persisted body, once uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_link: Option<String>,
}

impl Document {
    /// Build a document from its candidate's metadata and converted body.
    ///
    /// Title, publication date and abstract are copied from the candidate,
    /// never parsed out of the body.
    pub fn from_candidate(candidate: &SearchCandidate, body_text: String) -> Self {
        Self {
            source_url: candidate.link.clone(),
            candidate: candidate.clone(),
            title: candidate.title.clone(),
            authors: None,
            publication_date: candidate.publication_date_str.clone(),
            abstract_text: candidate.snippet.clone(),
            body_text,
            storage_link: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage / RunError
// ---------------------------------------------------------------------------

/// A state of the per-topic pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PrepareTopic,
    Search,
    Rank,
    Fetch,
    Convert,
    Persist,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrepareTopic => "prepare_topic",
            Self::Search => "search",
            Self::Rank => "rank",
            Self::Fetch => "fetch",
            Self::Convert => "convert",
            Self::Persist => "persist",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a run's aggregated error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub topic: String,
    pub stage: Stage,
    pub message: String,
}

impl RunError {
    pub fn new(topic: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.topic, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(link: &str) -> SearchCandidate {
        SearchCandidate::new(Url::parse(link).unwrap())
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn raw_hit_without_link_is_missing_input() {
        let hit = RawHit {
            title: Some("No link".into()),
            ..Default::default()
        };
        let err = SearchCandidate::try_from(hit).unwrap_err();
        assert!(matches!(err, HarvestError::MissingInput { .. }));
    }

    #[test]
    fn raw_hit_with_garbage_link_is_validation_error() {
        let hit = RawHit {
            link: Some("not a url".into()),
            ..Default::default()
        };
        let err = SearchCandidate::try_from(hit).unwrap_err();
        assert!(matches!(err, HarvestError::Validation { .. }));
    }

    #[test]
    fn raw_hit_maps_fields() {
        let hit = RawHit {
            title: Some("Attention".into()),
            link: Some("https://arxiv.org/pdf/1706.03762.pdf".into()),
            snippet: Some("Transformers".into()),
            source: Some("arxiv.org".into()),
            publication_date: Some("2017".into()),
            cited_by: Some(100_000),
            raw: serde_json::json!({"position": 1}),
        };
        let c = SearchCandidate::try_from(hit).unwrap();
        assert_eq!(c.link.as_str(), "https://arxiv.org/pdf/1706.03762.pdf");
        assert_eq!(c.source_name.as_deref(), Some("arxiv.org"));
        assert_eq!(c.citation_count, Some(100_000));
        assert_eq!(c.raw_payload["position"], 1);
        assert!(c.quality_score.is_none());
    }

    #[test]
    fn content_kind_from_url_suffix() {
        let pdf = Url::parse("https://example.com/paper.PDF").unwrap();
        assert_eq!(ContentKind::from_url(&pdf), ContentKind::Pdf);

        let html = Url::parse("https://example.com/paper").unwrap();
        assert_eq!(ContentKind::from_url(&html), ContentKind::Html);

        let query = Url::parse("https://example.com/paper.pdf?download=1").unwrap();
        assert_eq!(ContentKind::from_url(&query), ContentKind::Html);
    }

    #[test]
    fn content_kind_unknown_for_non_http_schemes() {
        for link in ["ftp://example.com/paper.pdf", "file:///tmp/paper.pdf", "mailto:a@b.c"] {
            let url = Url::parse(link).unwrap();
            assert_eq!(ContentKind::from_url(&url), ContentKind::Unknown, "{link}");
        }
    }

    #[test]
    fn fetched_content_payload_is_exclusive() {
        let ok = FetchedContent::with_file(candidate("https://e.com/a.pdf"), "/tmp/a.pdf".into());
        assert!(ok.is_success());
        assert!(ok.local_file_ref().is_some());
        assert!(ok.raw_text().is_none());
        assert_eq!(ok.kind(), ContentKind::Pdf);

        let text = FetchedContent::with_text(candidate("https://e.com/a"), "body".into());
        assert!(text.is_success());
        assert!(text.local_file_ref().is_none());
        assert_eq!(text.raw_text(), Some("body"));

        let failed = FetchedContent::failed(candidate("ftp://e.com/a"), None, "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.kind(), ContentKind::Unknown);
        assert_eq!(failed.error_message(), Some("boom"));
        assert!(failed.local_file_ref().is_none() && failed.raw_text().is_none());
    }

    #[test]
    fn document_copies_candidate_metadata() {
        let mut c = candidate("https://e.com/paper");
        c.title = Some("Title".into());
        c.snippet = Some("Snippet".into());
        c.publication_date_str = Some("2021".into());

        let doc = Document::from_candidate(&c, "# Body\n".into());
        assert_eq!(doc.title.as_deref(), Some("Title"));
        assert_eq!(doc.abstract_text.as_deref(), Some("Snippet"));
        assert_eq!(doc.publication_date.as_deref(), Some("2021"));
        assert!(doc.authors.is_none());
        assert!(doc.storage_link.is_none());

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["abstract"], "Snippet");
    }

    #[test]
    fn run_error_display() {
        let err = RunError::new("RAG metrics", Stage::Search, "HTTP 500");
        assert_eq!(err.to_string(), "[search] RAG metrics: HTTP 500");
    }
}
