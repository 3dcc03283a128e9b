//! HTML to Markdown conversion for paper landing pages and articles.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use harvester_shared::{HarvestError, Result};

use crate::cleanup;

/// Result of converting an HTML page to Markdown.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    pub markdown: String,
    /// Approximate word count, code blocks excluded.
    pub word_count: usize,
}

/// Tags whose content never reaches the Markdown output.
const SKIPPED_TAGS: [&str; 8] = [
    "script", "style", "nav", "iframe", "noscript", "svg", "header", "footer",
];

/// Content containers in priority order. The `ltx_` classes are the arXiv
/// HTML (LaTeXML) renderings; the rest cover publisher and blog layouts.
const CONTENT_SELECTORS: [&str; 8] = [
    ".ltx_document",
    "article .article-body",
    "#abstract-and-body",
    "[role=\"main\"]",
    "article",
    "main",
    "#content",
    ".content",
];

static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Convert an HTML page (or fragment) to cleaned Markdown.
///
/// Picks the main content container, turns tables into Markdown tables,
/// runs `htmd`, then the cleanup passes. Relative links are resolved
/// against `source_url` when given.
#[instrument(skip_all, fields(url = source_url.map(Url::as_str).unwrap_or("-")))]
pub fn convert_html(html: &str, source_url: Option<&Url>) -> Result<ConvertResult> {
    let content_html = extract_content_html(html);
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| HarvestError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    let markdown = cleanup::run_pipeline(&raw_markdown, source_url);
    let word_count = count_words(&markdown);

    debug!(word_count, final_len = markdown.len(), "conversion complete");

    Ok(ConvertResult {
        markdown,
        word_count,
    })
}

/// Heuristic: does this text look like markup rather than prose?
pub fn looks_like_html(text: &str) -> bool {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)<(?:!doctype|html|body|div|p|article|main|section|h[1-6]|table|span)[\s>/]")
            .expect("valid regex")
    });

    let head: String = text.trim_start().chars().take(4096).collect();
    TAG_RE.is_match(&head)
}

// ---------------------------------------------------------------------------
// Content extraction
// ---------------------------------------------------------------------------

/// Inner HTML of the main content container, else `<body>`, else the input.
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    for sel_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            return el.inner_html();
        }
    }

    doc.select(&BODY_SEL)
        .next()
        .map(|body| body.inner_html())
        .unwrap_or_else(|| html.to_string())
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Replace each `<table>` with a Markdown table before `htmd` runs, since
/// `htmd` flattens tables into loose text.
fn preprocess_tables(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    if doc.select(&TABLE_SEL).next().is_none() {
        return html.to_string();
    }

    // Work on the parser's serialization so each table's outer HTML matches
    // exactly, implied `<tbody>` included.
    let mut result = doc.root_element().inner_html();

    for table in doc.select(&TABLE_SEL) {
        let md_table = html_table_to_markdown(&table);
        result = result.replacen(&table.html(), &md_table, 1);
    }

    result
}

fn html_table_to_markdown(table: &ElementRef) -> String {
    let cell_text = |cell: ElementRef| cell.text().collect::<String>().trim().replace('|', "\\|");

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut has_header = false;

    for tr in table.select(&TR_SEL) {
        let ths: Vec<String> = tr.select(&TH_SEL).map(cell_text).collect();
        if !ths.is_empty() && rows.is_empty() {
            has_header = true;
            rows.push(ths);
            continue;
        }

        let tds: Vec<String> = tr
            .select(&TD_SEL)
            .map(cell_text)
            .chain(ths)
            .collect();
        if !tds.is_empty() {
            rows.push(tds);
        }
    }

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }
    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let render_row = |row: &[String]| format!("| {} |\n", row.join(" | "));

    let mut md = String::from("\n\n");
    md.push_str(&render_row(&rows[0]));
    md.push_str(&render_row(&vec!["---".to_string(); col_count]));

    let data_start = usize::from(has_header);
    for row in &rows[data_start..] {
        md.push_str(&render_row(row));
    }
    md.push('\n');
    md
}

// ---------------------------------------------------------------------------
// Word count
// ---------------------------------------------------------------------------

fn count_words(md: &str) -> usize {
    static CODE_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

    CODE_BLOCK_RE
        .replace_all(md, "")
        .split_whitespace()
        .filter(|w| !w.chars().all(|c| c == '#' || c == '|' || c == '-'))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn converts_article_body() {
        let html = "<html><body><article><h1>Dense Retrieval</h1><p>We propose a retriever.</p></article></body></html>";
        let result = convert_html(html, None).unwrap();
        assert!(result.markdown.contains("# Dense Retrieval"));
        assert!(result.markdown.contains("We propose a retriever."));
        assert!(result.word_count >= 5);
    }

    #[test]
    fn strips_page_chrome() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <main><h1>Benchmark</h1><p>Results on KILT.</p></main>
            <footer><p>Copyright 2024 Publisher</p></footer>
        </body></html>"#;

        let result = convert_html(html, None).unwrap();
        assert!(result.markdown.contains("Results on KILT."));
        assert!(!result.markdown.contains("Copyright 2024"));
        assert!(!result.markdown.contains("Home"));
    }

    #[test]
    fn prefers_arxiv_html_container() {
        let html = r#"<html><body>
            <div class="sidebar"><p>Related papers</p></div>
            <div class="ltx_document"><h1>Attention</h1><p>Transformers everywhere.</p></div>
        </body></html>"#;

        let result = convert_html(html, None).unwrap();
        assert!(result.markdown.contains("Transformers everywhere."));
        assert!(!result.markdown.contains("Related papers"));
    }

    #[test]
    fn falls_back_to_body() {
        let html = "<html><body><h1>Plain</h1><p>Body text.</p></body></html>";
        let result = convert_html(html, None).unwrap();
        assert!(result.markdown.contains("Plain"));
        assert!(result.markdown.contains("Body text."));
    }

    #[test]
    fn renders_tables() {
        let html = r#"<main>
            <table>
                <thead><tr><th>Model</th><th>EM</th></tr></thead>
                <tbody>
                    <tr><td>RAG-Seq</td><td>44.5</td></tr>
                    <tr><td>DPR</td><td>41.5</td></tr>
                </tbody>
            </table>
        </main>"#;

        let result = convert_html(html, None).unwrap();
        assert!(result.markdown.contains("| Model | EM |"));
        assert!(result.markdown.contains("| RAG-Seq | 44.5 |"));
    }

    #[test]
    fn headerless_table_uses_first_row() {
        let html = "<main><table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table><p>After.</p></main>";
        let result = convert_html(html, None).unwrap();
        assert!(result.markdown.contains("| a | b |"));
        assert!(result.markdown.contains("| c |"));
        assert!(result.markdown.contains("After."));
    }

    #[test]
    fn resolves_relative_links() {
        let html = r#"<main><p>See <a href="/abs/2005.11401">the paper</a>.</p></main>"#;
        let result = convert_html(html, Some(&url("https://arxiv.org/html/2005.11401"))).unwrap();
        assert!(result.markdown.contains("(https://arxiv.org/abs/2005.11401)"));
    }

    #[test]
    fn no_block_tags_in_output() {
        let html = r#"<main><h2>Method</h2><p>This is <strong>clean</strong>.</p><div class="note"><p>Note.</p></div></main>"#;
        let result = convert_html(html, None).unwrap();
        assert!(!result.markdown.contains("<p>"));
        assert!(!result.markdown.contains("<div"));
        assert!(result.markdown.contains("**clean**"));
    }

    #[test]
    fn word_count_excludes_code() {
        let html = r#"<main><p>One two three.</p><pre><code>many many code words that do not count</code></pre></main>"#;
        let result = convert_html(html, None).unwrap();
        assert!(result.word_count < 6, "word_count={}", result.word_count);
    }

    #[test]
    fn empty_page_converts_to_blank() {
        let result = convert_html("<html><body></body></html>", None).unwrap();
        assert!(result.markdown.trim().is_empty());
        assert_eq!(result.word_count, 0);
    }

    #[test]
    fn html_detection() {
        assert!(looks_like_html("<!DOCTYPE html><html><body></body></html>"));
        assert!(looks_like_html("  <div class=\"abs\">text</div>"));
        assert!(looks_like_html("<p>Paragraph</p>"));
        assert!(!looks_like_html("Plain abstract text about x < y and y > z."));
        assert!(!looks_like_html("# Markdown heading\n\nBody"));
    }
}
