//! Search-term extraction from filenames and URL paths.

use crate::tools::url_parts::{strip_extension, UrlDescriptor};
use std::collections::HashSet;

pub const MAX_TERMS: usize = 10;

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "but", "by", "can", "could", "did", "does", "doing", "for", "from",
    "had", "has", "have", "her", "here", "his", "how", "into", "its", "just", "more",
    "most", "not", "now", "off", "once", "only", "other", "our", "out", "over", "own",
    "same", "she", "should", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "too", "under", "until",
    "very", "was", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours",
];

/// Tokens that show up in URLs but say nothing about the page.
const WEB_TERMS: &[&str] = &[
    "page", "pages", "index", "html", "htm", "xhtml", "php", "asp", "aspx", "jsp", "cgi",
    "shtml", "default", "home", "www", "http", "https", "com", "org", "net", "main",
    "view", "item", "content", "file", "files", "download", "amp", "utm", "print",
];

fn is_filtered(token: &str) -> bool {
    token.chars().count() <= 2
        || token.chars().all(|c| c.is_ascii_digit())
        || STOP_WORDS.contains(&token)
        || WEB_TERMS.contains(&token)
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn singularize(word: &str) -> Option<String> {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();
    if n > 4 && word.ends_with("ies") && !is_vowel(chars[n - 4]) {
        return Some(format!("{}y", &word[..word.len() - 3]));
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) && n > suffix.len() {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is")
    {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

fn pluralize(word: &str) -> Option<String> {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();
    if n == 0 || word.ends_with("us") || word.ends_with("is") {
        return None;
    }
    if n > 1 && chars[n - 1] == 'y' && !is_vowel(chars[n - 2]) {
        return Some(format!("{}ies", &word[..word.len() - 1]));
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return Some(format!("{}es", word));
    }
    Some(format!("{}s", word))
}

/// The singular of a plural or the plural of a singular.
///
/// Each branch is checked against its inverse, which makes the mapping an involution:
/// `variant(variant(w)) == w` whenever both are defined.
pub fn number_variant(word: &str) -> Option<String> {
    if let Some(singular) = singularize(word) {
        if pluralize(&singular).as_deref() == Some(word) {
            return Some(singular);
        }
    }
    let plural = pluralize(word)?;
    if singularize(&plural).as_deref() == Some(word) {
        Some(plural)
    } else {
        None
    }
}

/// Normalized search terms for a filename or path fragment.
///
/// Returns an empty list when nothing meaningful survives; callers treat that as
/// "cannot build a search query".
pub fn extract_terms(input: &str) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return Vec::new();
    }

    let stem = strip_extension(input);
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    let tokens = stem
        .split(|c: char| matches!(c, '-' | '_' | '.' | '/' | '+') || c.is_whitespace())
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && !is_filtered(t));

    for token in tokens {
        if terms.len() >= MAX_TERMS {
            break;
        }
        let variant = number_variant(&token).filter(|v| !is_filtered(v));
        if seen.insert(token.clone()) {
            terms.push(token);
        }
        if let Some(v) = variant {
            if terms.len() < MAX_TERMS && seen.insert(v.clone()) {
                terms.push(v);
            }
        }
    }

    terms
}

/// Terms for a broken URL: the filename first, then the path when the filename is empty
/// or made only of filtered tokens.
pub fn terms_for_descriptor(desc: &UrlDescriptor) -> Vec<String> {
    let from_file = extract_terms(&desc.file_name);
    if !from_file.is_empty() {
        return from_file;
    }
    extract_terms(&desc.path_segments.join(" "))
}
