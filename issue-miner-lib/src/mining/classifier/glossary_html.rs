//! Keyword extraction from a saved ML glossary page.
//!
//! Each glossary term is an `<h2 class="hide-from-toc" data-text="...">` heading.

use regex::Regex;
use std::sync::LazyLock;

static H2_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<h2\b([^>]*)>").expect("invalid regex"));
static CLASS_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)\bclass\s*=\s*"([^"]*)""#).expect("invalid regex"));
static DATA_TEXT_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)\bdata-text\s*=\s*"([^"]*)""#).expect("invalid regex"));

const TERM_CLASS: &str = "hide-from-toc";

/// Glossary terms in order of appearance, trimmed and deduplicated.
#[must_use]
pub fn extract_glossary_terms(html: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    for tag in H2_TAG.captures_iter(html) {
        let attributes = &tag[1];

        let is_term = CLASS_ATTR
            .captures(attributes)
            .is_some_and(|class| class[1].split_whitespace().any(|c| c == TERM_CLASS));
        if !is_term {
            continue;
        }

        let Some(text) = DATA_TEXT_ATTR.captures(attributes) else {
            continue;
        };

        let term = unescape(text[1].trim());
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }

    terms
}

fn unescape(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
