use super::clean::normalize_text;
use super::quality::is_substantial;
use super::RustScraper;
use crate::types::Heading;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Main-content containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=main]",
    "[itemprop=articleBody]",
    "#content",
    "#main",
    ".content",
    ".main-content",
    ".post-content",
    ".entry-content",
    ".article-content",
];

const INVISIBLE: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Text of `root` without script/style payloads, case-folded and whitespace-collapsed.
pub(super) fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| INVISIBLE.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(text);
        }
    }
    normalize_text(&parts.join(" "))
}

impl RustScraper {
    /// Headings h1–h6 in document order.
    pub(super) fn extract_headings(&self, document: &Html) -> Vec<Heading> {
        let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|element| {
                let level = element.value().name().trim_start_matches('h').parse::<u8>().ok()?;
                let text = visible_text(element);
                (!text.is_empty()).then_some(Heading { level, text })
            })
            .collect()
    }

    /// Text of the first content container that carries enough text.
    pub(super) fn extract_container_text(&self, document: &Html) -> Option<String> {
        for css in CONTENT_SELECTORS {
            let Ok(selector) = Selector::parse(css) else {
                continue;
            };
            for element in document.select(&selector) {
                let text = visible_text(element);
                if is_substantial(&text) {
                    debug!("main content from '{}' ({} chars)", css, text.len());
                    return Some(text);
                }
            }
        }
        None
    }

    /// Whole-body text, used when no container matched.
    pub(super) fn extract_body_text(&self, document: &Html) -> String {
        let Ok(selector) = Selector::parse("body") else {
            return String::new();
        };
        document
            .select(&selector)
            .next()
            .map(visible_text)
            .unwrap_or_default()
    }
}
