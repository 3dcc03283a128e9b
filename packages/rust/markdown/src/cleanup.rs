//! Post-conversion cleanup passes.
//!
//! Each pass is a `&str -> String` function. Two pipelines are assembled
//! from them: [`run_pipeline`] for Markdown produced from HTML, and
//! [`run_text_pipeline`] for plain text pulled out of PDFs or extractors.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Cleanup for Markdown converted from HTML.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = normalize_headings(md);
    result = clean_blank_lines(&result);
    result = fix_code_block_languages(&result);
    result = strip_leftover_html(&result);
    result = resolve_links(&result, base_url);
    result = normalize_whitespace(&result);
    ensure_trailing_newline(&result)
}

/// Cleanup for plain text (PDF text layers, extractor output).
pub(crate) fn run_text_pipeline(text: &str) -> String {
    let mut result = text.replace("\r\n", "\n").replace(['\r', '\u{c}'], "\n");
    result = join_hyphenated_breaks(&result);
    result = drop_page_numbers(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);
    ensure_trailing_newline(&result)
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

/// Keep the first H1; later H1s become H2.
fn normalize_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));

    let mut seen_h1 = false;
    md.lines()
        .map(|line| match H_RE.captures(line) {
            Some(caps) if &caps[1] == "#" => {
                if seen_h1 {
                    format!("## {}", &caps[2])
                } else {
                    seen_h1 = true;
                    line.to_string()
                }
            }
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n\n").into_owned()
}

// ---------------------------------------------------------------------------
// Code fences
// ---------------------------------------------------------------------------

/// `language-python` / `lang-python` / `highlight-python` fences become `python`.
fn fix_code_block_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "```$1").into_owned()
}

// ---------------------------------------------------------------------------
// Leftover HTML
// ---------------------------------------------------------------------------

/// Drop layout tags that survived conversion, outside code fences only.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|sup|sub)(?:\s[^>]*)?>",
        )
        .expect("valid regex")
    });

    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                line.to_string()
            } else {
                HTML_TAG_RE.replace_all(line, "").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Resolve relative link targets against the page URL. Images are left alone.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    let Some(base) = base_url else {
        return md.to_string();
    };

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let (bang, text, href) = (&caps[1], &caps[2], &caps[3]);
            if !bang.is_empty() || is_absolute_or_anchor(href) {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn is_absolute_or_anchor(href: &str) -> bool {
    href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with('#')
        || href.starts_with("mailto:")
}

// ---------------------------------------------------------------------------
// PDF text layer artefacts
// ---------------------------------------------------------------------------

/// `retrie-\nval` becomes `retrieval`.
fn join_hyphenated_breaks(text: &str) -> String {
    static HYPHEN_BREAK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"([a-z])-\n([a-z])").expect("valid regex"));

    HYPHEN_BREAK_RE.replace_all(text, "$1$2").into_owned()
}

/// Remove lines holding nothing but a page number.
fn drop_page_numbers(text: &str) -> String {
    static PAGE_NUMBER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*\d{1,4}\s*$").expect("valid regex"));

    text.lines()
        .filter(|line| !PAGE_NUMBER_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

fn normalize_whitespace(md: &str) -> String {
    md.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

fn ensure_trailing_newline(md: &str) -> String {
    format!("{}\n", md.trim_end_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_h1_is_demoted() {
        let input = "# Paper\n\nIntro\n\n# Related Work\n\nMore";
        assert_eq!(
            normalize_headings(input),
            "# Paper\n\nIntro\n\n## Related Work\n\nMore"
        );
    }

    #[test]
    fn heading_hierarchy_kept() {
        let input = "# Only One\n\n## Method\n\n### Setup";
        assert_eq!(normalize_headings(input), input);
    }

    #[test]
    fn excess_blank_lines_collapsed() {
        assert_eq!(clean_blank_lines("A\n\n\n\n\nB"), "A\n\n\nB");
        assert_eq!(clean_blank_lines("A\n\nB"), "A\n\nB");
    }

    #[test]
    fn fence_language_prefix_stripped() {
        let input = "```language-python\nprint('hi')\n```";
        assert!(fix_code_block_languages(input).starts_with("```python"));
    }

    #[test]
    fn layout_tags_stripped_outside_fences() {
        let input = "Score<sup>1</sup>\n\n```html\n<div>kept</div>\n```\n<div class=\"x\">text</div>";
        let result = strip_leftover_html(input);
        assert!(result.contains("Score1"));
        assert!(result.contains("<div>kept</div>"));
        assert!(result.ends_with("text"));
    }

    #[test]
    fn relative_links_resolved() {
        let base = Url::parse("https://aclanthology.org/2024.acl-long.1/").unwrap();
        assert_eq!(
            resolve_links("[PDF](/2024.acl-long.1.pdf)", Some(&base)),
            "[PDF](https://aclanthology.org/2024.acl-long.1.pdf)"
        );
    }

    #[test]
    fn absolute_anchor_and_image_links_untouched() {
        let base = Url::parse("https://example.com/a/").unwrap();
        for input in [
            "[x](https://other.org/p)",
            "[x](#sec-2)",
            "![fig](fig1.png)",
        ] {
            assert_eq!(resolve_links(input, Some(&base)), input);
        }
    }

    #[test]
    fn hyphenated_line_breaks_joined() {
        assert_eq!(
            join_hyphenated_breaks("dense retrie-\nval works"),
            "dense retrieval works"
        );
        assert_eq!(join_hyphenated_breaks("GPT-\n4"), "GPT-\n4");
    }

    #[test]
    fn page_number_lines_dropped() {
        assert_eq!(drop_page_numbers("text\n 12 \nmore"), "text\nmore");
        assert_eq!(drop_page_numbers("in 2023 we"), "in 2023 we");
    }

    #[test]
    fn text_pipeline_normalizes_pdf_text() {
        let input = "Abstract  \r\nWe study retrie-\nval.\u{c}3\n\n\n\n\n\nIntroduction";
        let result = run_text_pipeline(input);
        assert!(result.contains("retrieval."));
        assert!(!result.contains('\r'));
        assert!(!result.contains("\n3\n"));
        assert!(!result.contains("\n\n\n\n"));
        assert!(result.starts_with("Abstract\n"));
        assert!(result.ends_with("Introduction\n"));
    }

    #[test]
    fn markdown_pipeline_end_to_end() {
        let input = "# Title\n\n\n\n\n\n## Section\n\n<div>Body</div>\n\n```lang-rust\nfn x() {}\n```\n\n[ref](/refs)   ";
        let base = Url::parse("https://example.com/paper").unwrap();
        let result = run_pipeline(input, Some(&base));

        assert!(!result.contains("\n\n\n\n"));
        assert!(result.contains("```rust"));
        assert!(!result.contains("<div>"));
        assert!(result.contains("[ref](https://example.com/refs)"));
        assert!(result.ends_with(")\n"));
    }
}
