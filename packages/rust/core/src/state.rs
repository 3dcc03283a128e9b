//! Mutable state of one pipeline run.

use tempfile::TempDir;

use harvester_shared::{Document, FetchedContent, RunError, SearchCandidate, Stage};

/// Whether another topic follows the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    End,
}

/// Run-wide state shared by every stage.
///
/// Per-topic fields are reset by [`RunState::advance`]; the accumulators
/// (`all_documents`, `all_storage_links`, `errors`) only ever grow.
#[derive(Debug)]
pub struct RunState {
    topics: Vec<String>,
    current_index: Option<usize>,
    current_topic: Option<String>,

    pub(crate) candidates: Vec<SearchCandidate>,
    pub(crate) ranked: Vec<SearchCandidate>,
    pub(crate) fetched: Vec<FetchedContent>,
    pub(crate) topic_documents: Vec<Document>,
    pub(crate) download_dir: Option<TempDir>,

    all_documents: Vec<Document>,
    all_storage_links: Vec<String>,
    errors: Vec<RunError>,
}

impl RunState {
    pub fn new(topics: Vec<String>) -> Self {
        Self {
            topics,
            current_index: None,
            current_topic: None,
            candidates: Vec::new(),
            ranked: Vec::new(),
            fetched: Vec::new(),
            topic_documents: Vec::new(),
            download_dir: None,
            all_documents: Vec::new(),
            all_storage_links: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Move to the next topic, clearing per-topic fields.
    ///
    /// Returns `false` (leaving the state untouched apart from releasing the
    /// download scratch directory) when every topic has been processed.
    pub fn advance(&mut self) -> bool {
        self.download_dir = None;

        let next = self.current_index.map_or(0, |i| i + 1);
        if next >= self.topics.len() {
            return false;
        }

        self.current_index = Some(next);
        self.current_topic = Some(self.topics[next].clone());
        self.candidates.clear();
        self.ranked.clear();
        self.fetched.clear();
        self.topic_documents.clear();
        true
    }

    /// `Continue` unless the current topic is the last one.
    pub fn should_continue(&self) -> Continuation {
        let next = self.current_index.map_or(0, |i| i + 1);
        if next < self.topics.len() {
            Continuation::Continue
        } else {
            Continuation::End
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_topic(&self) -> Option<&str> {
        self.current_topic.as_deref()
    }

    pub fn all_documents(&self) -> &[Document] {
        &self.all_documents
    }

    pub fn all_storage_links(&self) -> &[String] {
        &self.all_storage_links
    }

    pub fn errors(&self) -> &[RunError] {
        &self.errors
    }

    pub(crate) fn record_error(&mut self, stage: Stage, message: impl Into<String>) {
        let topic = self.current_topic.clone().unwrap_or_default();
        self.errors.push(RunError::new(topic, stage, message));
    }

    pub(crate) fn push_document(&mut self, document: Document) {
        self.all_documents.push(document.clone());
        self.topic_documents.push(document);
    }

    /// Merge one topic's persisted documents back into the accumulators.
    ///
    /// `documents` are this topic's documents, in the order they were pushed,
    /// now carrying storage links where the upload succeeded.
    pub(crate) fn merge_persisted(&mut self, documents: Vec<Document>, links: Vec<String>) {
        let start = self.all_documents.len() - documents.len().min(self.all_documents.len());
        for (slot, doc) in self.all_documents[start..].iter_mut().zip(&documents) {
            slot.storage_link.clone_from(&doc.storage_link);
        }
        self.topic_documents = documents;
        self.all_storage_links.extend(links);
    }

    /// Hand over the accumulators at the end of a run.
    pub(crate) fn into_results(self) -> (Vec<Document>, Vec<String>, Vec<RunError>) {
        (self.all_documents, self.all_storage_links, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn topics(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("topic {i}")).collect()
    }

    fn doc(path: &str) -> Document {
        let candidate =
            SearchCandidate::new(Url::parse(&format!("https://example.com/{path}")).unwrap());
        Document::from_candidate(&candidate, "body".into())
    }

    #[test]
    fn should_continue_until_last_index() {
        let mut state = RunState::new(topics(3));
        let mut seen = Vec::new();
        while state.advance() {
            seen.push((state.current_index(), state.should_continue()));
        }
        assert_eq!(
            seen,
            vec![
                (Some(0), Continuation::Continue),
                (Some(1), Continuation::Continue),
                (Some(2), Continuation::End),
            ]
        );
    }

    #[test]
    fn advance_past_end_leaves_state() {
        let mut state = RunState::new(topics(1));
        assert!(state.advance());
        state.record_error(Stage::Search, "x");
        assert!(!state.advance());
        assert_eq!(state.current_index(), Some(0));
        assert_eq!(state.current_topic(), Some("topic 0"));
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn no_topics_ends_immediately() {
        let mut state = RunState::new(Vec::new());
        assert_eq!(state.should_continue(), Continuation::End);
        assert!(!state.advance());
        assert!(state.current_topic().is_none());
    }

    #[test]
    fn advance_clears_transient_but_not_accumulators() {
        let mut state = RunState::new(topics(2));
        state.advance();
        state.candidates.push(doc("a").candidate);
        state.push_document(doc("a"));
        state.record_error(Stage::Fetch, "failed");

        state.advance();
        assert!(state.candidates.is_empty());
        assert!(state.topic_documents.is_empty());
        assert_eq!(state.all_documents().len(), 1);
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].topic, "topic 0");
    }

    #[test]
    fn merge_persisted_updates_links_of_current_topic() {
        let mut state = RunState::new(topics(2));
        state.advance();
        state.push_document(doc("first"));
        state.advance();
        state.push_document(doc("a"));
        state.push_document(doc("b"));

        let mut persisted = state.topic_documents.clone();
        persisted[1].storage_link = Some("gs://b".into());
        state.merge_persisted(persisted, vec!["gs://b".into()]);

        let links: Vec<_> = state
            .all_documents()
            .iter()
            .map(|d| d.storage_link.as_deref())
            .collect();
        assert_eq!(links, vec![None, None, Some("gs://b")]);
        assert_eq!(state.all_storage_links(), ["gs://b".to_string()]);
    }
}
