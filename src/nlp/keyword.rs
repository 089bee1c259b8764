use crate::tools::url_parts::UrlDescriptor;
use crate::types::ScrapedPage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BODY_WEIGHT: f64 = 1.0;
pub const TITLE_WEIGHT: f64 = 2.0;
pub const HEADING_WEIGHT: f64 = 1.5;
const DOMAIN_BONUS: f64 = 0.5;
const FILENAME_BONUS: f64 = 0.5;
pub const MIN_MATCH_SCORE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLocation {
    Title,
    Heading,
    Body,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub matched: bool,
    pub normalized_score: f64,
    pub matched_terms: Vec<String>,
    pub term_count: usize,
    /// Where each matched term was found.
    pub locations: BTreeMap<String, Vec<MatchLocation>>,
    pub bonus: f64,
}

impl KeywordMatch {
    pub fn match_ratio(&self) -> f64 {
        if self.term_count == 0 {
            0.0
        } else {
            self.matched_terms.len() as f64 / self.term_count as f64
        }
    }
}

/// Score how well a scraped page covers the search terms of the original URL.
///
/// `context` adds the domain/filename bonus; `min_ratio` is the share of terms that must
/// appear for the page to count as a match. The `MIN_MATCH_SCORE` floor is checked against
/// the score after the coverage and prominence boosts, the same number reported as
/// `normalized_score`.
pub fn score_keywords(
    terms: &[String],
    page: &ScrapedPage,
    context: Option<&UrlDescriptor>,
    min_ratio: f64,
) -> KeywordMatch {
    if terms.is_empty() {
        return KeywordMatch::default();
    }

    let title = page.title.to_lowercase();
    let body = page.main_content.to_lowercase();
    let headings: Vec<String> = page.headings.iter().map(|h| h.text.to_lowercase()).collect();

    let mut total = 0.0;
    let mut matched_terms = Vec::new();
    let mut locations = BTreeMap::new();
    let mut prominent = false;

    for term in terms {
        let term = term.to_lowercase();
        if term.is_empty() {
            continue;
        }
        let mut found = Vec::new();
        let mut term_score = 0.0;
        if title.contains(&term) {
            term_score += TITLE_WEIGHT;
            found.push(MatchLocation::Title);
        }
        if headings.iter().any(|h| h.contains(&term)) {
            term_score += HEADING_WEIGHT;
            found.push(MatchLocation::Heading);
        }
        if body.contains(&term) {
            term_score += BODY_WEIGHT;
            found.push(MatchLocation::Body);
        }
        if found.is_empty() {
            continue;
        }
        prominent |= found
            .iter()
            .any(|l| matches!(l, MatchLocation::Title | MatchLocation::Heading));
        total += term_score;
        matched_terms.push(term.clone());
        locations.insert(term, found);
    }

    let mut bonus = 0.0;
    if let Some(desc) = context {
        let haystack_has = |needle: &str| {
            !needle.is_empty() && (body.contains(needle) || title.contains(needle))
        };
        if haystack_has(&desc.domain) {
            bonus += DOMAIN_BONUS;
        }
        let stem = desc.file_name_no_ext.to_lowercase();
        if stem.chars().count() > 2
            && (haystack_has(&stem) || haystack_has(&desc.readable_file_name().to_lowercase()))
        {
            bonus += FILENAME_BONUS;
        }
    }

    let term_count = terms.len();
    let mut score = ((total + bonus) / (term_count as f64 * TITLE_WEIGHT)).min(1.0);

    let matched_count = matched_terms.len();
    if matched_count == term_count {
        score = (score * 1.2).min(0.95);
    } else if matched_count as f64 >= 0.8 * term_count as f64 {
        score = (score * 1.1).min(0.9);
    }
    if prominent {
        score = (score * 1.1).min(1.0);
    }

    let required = (min_ratio * term_count as f64).ceil() as usize;
    let matched = matched_count > 0 && matched_count >= required && score >= MIN_MATCH_SCORE;

    KeywordMatch {
        matched,
        normalized_score: score,
        matched_terms,
        term_count,
        locations,
        bonus,
    }
}
