//! SerpAPI Google Scholar response parser.
//!
//! Each entry of `organic_results` looks roughly like:
//!
//! ```json
//! {
//!   "title": "Attention is all you need",
//!   "link": "https://arxiv.org/abs/1706.03762",
//!   "snippet": "...",
//!   "publication_info": { "summary": "A Vaswani, N Shazeer - Advances in ..., 2017 - arxiv.org" },
//!   "inline_links": { "cited_by": { "total": 120000 } }
//! }
//! ```
//!
//! Fields are mapped onto [`RawHit`]; nothing here is validated, that is the
//! caller's job.

use std::sync::LazyLock;

use harvester_shared::RawHit;
use regex::Regex;
use serde_json::Value;

/// Matches a standalone four-digit year.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("year regex"));

/// Parse every `organic_results` entry into a [`RawHit`].
pub(crate) fn parse_organic_results(body: &Value) -> Vec<RawHit> {
    body.get("organic_results")
        .and_then(Value::as_array)
        .map(|results| results.iter().map(parse_hit).collect())
        .unwrap_or_default()
}

/// Map one result object onto a [`RawHit`].
fn parse_hit(item: &Value) -> RawHit {
    let summary = item
        .pointer("/publication_info/summary")
        .and_then(Value::as_str);

    let source = str_field(item, "source").or_else(|| summary.and_then(source_from_summary));

    let publication_date = str_field(item, "publication_date")
        .or_else(|| summary.filter(|s| YEAR_RE.is_match(s)).map(String::from));

    RawHit {
        title: str_field(item, "title"),
        link: str_field(item, "link"),
        snippet: str_field(item, "snippet"),
        source,
        publication_date,
        cited_by: cited_by(item),
        raw: item.clone(),
    }
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// `inline_links.cited_by.total`, or a top-level integer `cited_by`.
fn cited_by(item: &Value) -> Option<u64> {
    item.pointer("/inline_links/cited_by/total")
        .or_else(|| item.get("cited_by"))
        .and_then(Value::as_u64)
}

/// The host or venue after the last ` - ` of a publication summary.
fn source_from_summary(summary: &str) -> Option<String> {
    summary
        .rsplit(" - ")
        .next()
        .filter(|_| summary.contains(" - "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
