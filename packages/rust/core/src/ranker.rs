//! Quality ranking of search candidates.
//!
//! Score = 0.4·relevance + 0.2·recency + 0.1·authority + 0.3·citations,
//! every component in `[0, 1]`.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use tracing::{debug, instrument};

use harvester_shared::SearchCandidate;

const RELEVANCE_WEIGHT: f64 = 0.4;
const RECENCY_WEIGHT: f64 = 0.2;
const AUTHORITY_WEIGHT: f64 = 0.1;
const CITATION_WEIGHT: f64 = 0.3;

/// Recency assigned when a date string exists but holds no year.
const UNPARSED_DATE_SCORE: f64 = 0.1;

/// Citation score when the count is unknown. Above a confirmed zero.
const UNKNOWN_CITATIONS_SCORE: f64 = 0.1;

/// Years over which recency decays linearly to zero.
const RECENCY_WINDOW_YEARS: f64 = 10.0;

/// About this many citations saturate the citation score.
const CITATION_SATURATION: f64 = 1000.0;

const TOP_VENUES: [&str; 3] = ["arxiv", "acm", "ieee"];
const ACADEMIC_NETWORKS: [&str; 2] = ["researchgate", "academia.edu"];

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));

/// Per-component scores of one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub relevance: f64,
    pub recency: f64,
    pub authority: f64,
    pub citations: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        RELEVANCE_WEIGHT * self.relevance
            + RECENCY_WEIGHT * self.recency
            + AUTHORITY_WEIGHT * self.authority
            + CITATION_WEIGHT * self.citations
    }
}

/// Scores candidates and keeps the best `top_n`.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    current_year: i32,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ranker {
    /// Ranker anchored at the current UTC year.
    pub fn new() -> Self {
        Self::with_year(Utc::now().year())
    }

    /// Ranker anchored at a fixed year.
    pub fn with_year(current_year: i32) -> Self {
        Self { current_year }
    }

    pub fn score(&self, candidate: &SearchCandidate, topic: &str) -> ScoreBreakdown {
        ScoreBreakdown {
            relevance: relevance_score(
                topic,
                candidate.title.as_deref(),
                candidate.snippet.as_deref(),
            ),
            recency: recency_score(candidate.publication_date_str.as_deref(), self.current_year),
            authority: authority_score(candidate.source_name.as_deref()),
            citations: citation_score(candidate.citation_count),
        }
    }

    /// Score every candidate once, sort by descending score and keep `top_n`.
    ///
    /// The sort is stable: equal scores keep their input order. Each returned
    /// candidate carries its `quality_score`.
    #[instrument(skip_all, fields(topic = %topic, candidates = candidates.len(), top_n = top_n))]
    pub fn rank(
        &self,
        candidates: Vec<SearchCandidate>,
        topic: &str,
        top_n: usize,
    ) -> Vec<SearchCandidate> {
        let mut scored: Vec<(f64, SearchCandidate)> = candidates
            .into_iter()
            .map(|mut candidate| {
                let breakdown = self.score(&candidate, topic);
                let total = breakdown.total();
                debug!(
                    url = %candidate.link,
                    total,
                    relevance = breakdown.relevance,
                    recency = breakdown.recency,
                    authority = breakdown.authority,
                    citations = breakdown.citations,
                    "scored candidate"
                );
                candidate.quality_score = Some(total);
                (total, candidate)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_n);
        scored.into_iter().map(|(_, candidate)| candidate).collect()
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Half a point each for the topic appearing in the title and in the snippet.
pub fn relevance_score(topic: &str, title: Option<&str>, snippet: Option<&str>) -> f64 {
    let topic = topic.trim().to_lowercase();
    if topic.is_empty() {
        return 0.0;
    }

    let contains = |text: Option<&str>| text.is_some_and(|t| t.to_lowercase().contains(&topic));

    let mut score = 0.0;
    if contains(title) {
        score += 0.5;
    }
    if contains(snippet) {
        score += 0.5;
    }
    f64::min(score, 1.0)
}

/// Linear decay over ten years from `current_year`; future years count as
/// this year.
pub fn recency_score(date: Option<&str>, current_year: i32) -> f64 {
    let Some(date) = date.filter(|d| !d.trim().is_empty()) else {
        return 0.0;
    };

    let Some(year) = YEAR_RE
        .captures(date)
        .and_then(|caps| caps[1].parse::<i32>().ok())
    else {
        return UNPARSED_DATE_SCORE;
    };

    let age = f64::from((current_year - year).max(0));
    (1.0 - age / RECENCY_WINDOW_YEARS).max(0.0)
}

pub fn authority_score(source: Option<&str>) -> f64 {
    let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) else {
        return 0.0;
    };
    let source = source.to_lowercase();

    if TOP_VENUES.iter().any(|v| source.contains(v)) {
        1.0
    } else if ACADEMIC_NETWORKS.iter().any(|v| source.contains(v)) {
        0.7
    } else {
        0.3
    }
}

/// `log10(count + 1) / log10(1001)`, capped at 1.
pub fn citation_score(count: Option<u64>) -> f64 {
    match count {
        None => UNKNOWN_CITATIONS_SCORE,
        Some(0) => 0.0,
        Some(n) => {
            let ratio = ((n as f64) + 1.0).log10() / (CITATION_SATURATION + 1.0).log10();
            ratio.min(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    const YEAR: i32 = 2025;

    fn candidate(n: usize) -> SearchCandidate {
        SearchCandidate::new(Url::parse(&format!("https://example.com/{n}")).unwrap())
    }

    fn full(
        n: usize,
        title: &str,
        date: Option<&str>,
        source: Option<&str>,
        cites: Option<u64>,
    ) -> SearchCandidate {
        let mut c = candidate(n);
        c.title = Some(title.to_string());
        c.publication_date_str = date.map(String::from);
        c.source_name = source.map(String::from);
        c.citation_count = cites;
        c
    }

    #[test]
    fn output_length_is_min_of_n_and_input() {
        let ranker = Ranker::with_year(YEAR);
        for (len, n) in [(0, 5), (3, 5), (5, 5), (8, 5), (4, 0)] {
            let input: Vec<_> = (0..len).map(candidate).collect();
            assert_eq!(ranker.rank(input, "rag", n).len(), len.min(n));
        }
    }

    #[test]
    fn sorted_descending_with_scores_set() {
        let ranker = Ranker::with_year(YEAR);
        let input = vec![
            full(0, "unrelated", None, None, Some(0)),
            full(1, "RAG evaluation", Some("2025"), Some("arXiv"), Some(1000)),
            full(2, "rag", Some("2019"), Some("blog"), Some(10)),
        ];

        let ranked = ranker.rank(input, "RAG", 3);
        let scores: Vec<f64> = ranked.iter().map(|c| c.quality_score.unwrap()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranked[0].link.path(), "/1");
        assert_eq!(ranked[2].link.path(), "/0");
    }

    #[test]
    fn ties_keep_input_order() {
        let ranker = Ranker::with_year(YEAR);
        let input: Vec<_> = (0..6).map(candidate).collect();
        let ranked = ranker.rank(input, "topic", 6);
        let order: Vec<&str> = ranked.iter().map(|c| c.link.path()).collect();
        assert_eq!(order, ["/0", "/1", "/2", "/3", "/4", "/5"]);
    }

    #[test]
    fn ties_after_higher_scores_keep_order() {
        let ranker = Ranker::with_year(YEAR);
        let input = vec![
            candidate(0),
            full(1, "x", None, Some("ieee"), None),
            candidate(2),
            full(3, "x", None, Some("acm"), None),
        ];
        let ranked = ranker.rank(input, "topic", 4);
        let order: Vec<&str> = ranked.iter().map(|c| c.link.path()).collect();
        assert_eq!(order, ["/1", "/3", "/0", "/2"]);
    }

    #[test]
    fn components_and_total_in_unit_range() {
        let ranker = Ranker::with_year(YEAR);
        let dates = [None, Some("2030"), Some("1990"), Some("n.d."), Some("May 2024")];
        let sources = [None, Some("arxiv.org"), Some("ResearchGate"), Some("blog")];
        let cites = [None, Some(0), Some(5), Some(1_000_000)];
        for date in dates {
            for source in sources {
                for cite in cites {
                    let mut c = full(0, "RAG metrics", date, source, cite);
                    c.snippet = Some("rag metrics".into());
                    let b = ranker.score(&c, "rag metrics");
                    for v in [b.relevance, b.recency, b.authority, b.citations, b.total()] {
                        assert!((0.0..=1.0).contains(&v), "out of range: {v} for {b:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let max = ScoreBreakdown {
            relevance: 1.0,
            recency: 1.0,
            authority: 1.0,
            citations: 1.0,
        };
        assert!((max.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn relevance_matches_title_and_snippet() {
        assert_eq!(relevance_score("RAG", Some("A RAG survey"), None), 0.5);
        assert_eq!(relevance_score("rag", Some("RAG"), Some("about rag")), 1.0);
        assert_eq!(relevance_score("rag", None, None), 0.0);
        assert_eq!(relevance_score("   ", Some("anything"), Some("anything")), 0.0);
    }

    #[test]
    fn recency_decays_and_clamps() {
        assert_eq!(recency_score(None, YEAR), 0.0);
        assert_eq!(recency_score(Some(""), YEAR), 0.0);
        assert_eq!(recency_score(Some("no year here"), YEAR), UNPARSED_DATE_SCORE);
        assert_eq!(recency_score(Some("2025"), YEAR), 1.0);
        assert_eq!(recency_score(Some("2031"), YEAR), 1.0);
        assert!((recency_score(Some("Jan 2020"), YEAR) - 0.5).abs() < 1e-12);
        assert_eq!(recency_score(Some("2015"), YEAR), 0.0);
        assert_eq!(recency_score(Some("1970"), YEAR), 0.0);

        let mut previous = f64::INFINITY;
        for year in (2000..=2030).rev() {
            let s = recency_score(Some(&year.to_string()), YEAR);
            assert!(s <= previous);
            previous = s;
        }
    }

    #[test]
    fn recency_uses_first_year_in_summary() {
        let s = recency_score(Some("J Doe - Proc. 2024 Workshop, 2021 - acm.org"), YEAR);
        assert!((s - 0.9).abs() < 1e-12);
    }

    #[test]
    fn authority_tiers() {
        assert_eq!(authority_score(Some("arXiv preprint")), 1.0);
        assert_eq!(authority_score(Some("dl.ACM.org")), 1.0);
        assert_eq!(authority_score(Some("ieeexplore.ieee.org")), 1.0);
        assert_eq!(authority_score(Some("researchgate.net")), 0.7);
        assert_eq!(authority_score(Some("Academia.edu")), 0.7);
        assert_eq!(authority_score(Some("medium.com")), 0.3);
        assert_eq!(authority_score(Some("  ")), 0.0);
        assert_eq!(authority_score(None), 0.0);
    }

    #[test]
    fn citation_ordering() {
        let zero = citation_score(Some(0));
        let unknown = citation_score(None);
        let five = citation_score(Some(5));
        let many = citation_score(Some(99));
        let saturated = citation_score(Some(1000));

        assert_eq!(zero, 0.0);
        assert_eq!(unknown, 0.1);
        assert!(zero < unknown && unknown < five && five < many && many < saturated);
        assert!((saturated - 1.0).abs() < 1e-9);
        assert_eq!(citation_score(Some(u64::MAX)), 1.0);
    }
}
