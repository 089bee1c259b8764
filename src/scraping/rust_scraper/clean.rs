use regex::Regex;
use std::sync::LazyLock;

static HIDDEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|template|svg)\b[^>]*>.*?</(script|style|noscript|template|svg)\s*>")
        .unwrap()
});
static COMMENTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

/// Case-fold and collapse whitespace.
pub(super) fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");
    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_default()
    });
    // `&amp;` last so "&amp;lt;" stays literal.
    numeric.replace("&amp;", "&")
}

/// Last-resort extractor: drop hidden blocks and tags with regexes.
pub(super) fn strip_tags(html: &str) -> String {
    let without_hidden = HIDDEN_BLOCKS.replace_all(html, " ");
    let without_comments = COMMENTS.replace_all(&without_hidden, " ");
    let text = TAGS.replace_all(&without_comments, " ");
    normalize_text(&decode_entities(&text))
}
