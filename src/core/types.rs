use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

// ───────────────────────────────────────────────────────────────────────────
// Inputs from the document layer and the link-check collaborator
// ───────────────────────────────────────────────────────────────────────────

/// A link found in a document. Positional fields are carried through untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UrlRecord {
    pub id: String,
    pub original_url: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
    /// Source document kind (`html`, `markdown`, `css`, ...).
    #[serde(default, rename = "type")]
    pub kind: String,
}

impl UrlRecord {
    pub fn new(id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            original_url: original_url.into(),
            line: 0,
            column: 0,
            kind: "text".to_string(),
        }
    }
}

/// Result of checking a single URL over HTTP.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UrlCheck {
    pub status: u16,
    pub status_text: String,
    pub response_time_ms: u64,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
}

impl UrlCheck {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Anything outside 2xx/3xx.
    pub fn is_broken(&self) -> bool {
        !self.is_success() && !self.is_redirect()
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Search + scrape
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchCandidate {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Provider label that produced this candidate (`duckduckgo`, `bing`, ...).
    pub source_provider: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// A content container (`main`, `article`, ...) matched.
    Container,
    /// No container matched; whole `<body>` text was used.
    Body,
    /// Structured parsing produced nothing; tags were stripped with regexes.
    Regex,
}

/// Case-folded, whitespace-normalized text of a fetched page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub headings: Vec<Heading>,
    pub main_content: String,
    pub method: ExtractionMethod,
    pub status_code: u16,
}

// ───────────────────────────────────────────────────────────────────────────
// Scoring + validation
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ValidationVerdict {
    pub http_valid: bool,
    #[serde(default)]
    pub http_status: Option<u16>,
    pub content_relevant: bool,
    pub content_score: f64,
    pub domain_relevance: f64,
    pub accessibility_score: f64,
    /// `0.3×domain + 0.3×accessibility + 0.4×content`.
    pub score: f64,
    pub overall_valid: bool,
    /// Content could not be checked; the verdict rests on reachability alone.
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Write-once slot for a verdict computed after the owning result was handed out.
///
/// Clones share the slot, so a background validator filling it is visible through every
/// copy of the candidate.
#[derive(Clone, Default)]
pub struct LateVerdict(Arc<OnceLock<ValidationVerdict>>);

impl LateVerdict {
    pub fn filled(verdict: ValidationVerdict) -> Self {
        let slot = Self::default();
        let _ = slot.0.set(verdict);
        slot
    }

    pub fn get(&self) -> Option<&ValidationVerdict> {
        self.0.get()
    }

    /// Returns `false` when the slot was already filled; the first verdict wins.
    pub fn fill(&self, verdict: ValidationVerdict) -> bool {
        self.0.set(verdict).is_ok()
    }
}

impl std::fmt::Debug for LateVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LateVerdict").field(&self.get()).finish()
    }
}

impl PartialEq for LateVerdict {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Serialize for LateVerdict {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LateVerdict {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<ValidationVerdict>::deserialize(deserializer)? {
            Some(v) => LateVerdict::filled(v),
            None => LateVerdict::default(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: SearchCandidate,
    pub confidence: f64,
    #[serde(default)]
    pub matched_terms: Vec<String>,
    pub domain_relevance: f64,
    pub path_similarity: f64,
    #[serde(default)]
    pub validation: LateVerdict,
}

impl ScoredCandidate {
    pub fn url(&self) -> &str {
        &self.candidate.url
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementSource {
    /// Site-scoped SERP result confirmed by scraping.
    Serp,
    /// Generic search result ranked by the confidence scorer.
    Confidence,
    /// Unvalidated best guess from the confidence path.
    BestGuess,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReplacementResult {
    pub original_url: String,
    pub replacement_url: String,
    pub confidence: f64,
    pub source: ReplacementSource,
    /// Provider that returned the replacement.
    pub provider: String,
    pub search_query: String,
    pub validated: bool,
    /// Verdict for the primary pick; `validated == validation.overall_valid`.
    #[serde(default)]
    pub validation: Option<ValidationVerdict>,
    pub alternatives: Vec<ScoredCandidate>,
    pub current_alternative_index: usize,
    pub total_alternatives: usize,
}

// ───────────────────────────────────────────────────────────────────────────
// Batch output
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Valid,
    Redirect,
    Invalid,
    Error,
    /// Not an http(s) link (`mailto:`, `tel:`, ...); never checked.
    Skipped,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchAttempt {
    pub queries_tried: Vec<String>,
    pub candidates_seen: usize,
    pub candidates_validated: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
    /// Present only when `surface_best_guess` is on and nothing validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_guess: Option<ReplacementResult>,
    /// The run was cancelled before this search finished; nothing was concluded.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UrlResult {
    pub record: UrlRecord,
    pub status: UrlStatus,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub status_text: String,
    pub response_time_ms: u64,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<ReplacementResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_attempt: Option<SearchAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub valid: usize,
    pub invalid: usize,
    pub redirect: usize,
    pub error: usize,
    pub skipped: usize,
    pub replaced: usize,
    pub fixed: usize,
    pub average_latency_ms: f64,
    pub cache_hits: usize,
    /// Broken links whose replacement search was cut short by cancellation.
    #[serde(default)]
    pub interrupted: usize,
    pub duration_ms: u64,
}

impl BatchStats {
    pub fn from_results(total: usize, results: &[UrlResult], duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            total,
            processed: results.len(),
            duration_ms,
            ..Default::default()
        };
        let mut latency_sum = 0u64;
        for r in results {
            match r.status {
                UrlStatus::Valid => stats.valid += 1,
                UrlStatus::Redirect => stats.redirect += 1,
                UrlStatus::Invalid => stats.invalid += 1,
                UrlStatus::Error => stats.error += 1,
                UrlStatus::Skipped => stats.skipped += 1,
            }
            if r.replacement.is_some() {
                stats.replaced += 1;
            }
            if r.fixed_url.is_some() {
                stats.fixed += 1;
            }
            if r.cache_hit {
                stats.cache_hits += 1;
            }
            if r.search_attempt.as_ref().is_some_and(|a| a.interrupted) {
                stats.interrupted += 1;
            }
            latency_sum += r.response_time_ms;
        }
        if !results.is_empty() {
            stats.average_latency_ms = latency_sum as f64 / results.len() as f64;
        }
        stats
    }
}

/// Events emitted by the batch orchestrator, in order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    ProcessingStarted {
        job_id: uuid::Uuid,
        total_urls: usize,
    },
    UrlProcessed {
        result: Box<UrlResult>,
        /// Percentage of the job processed so far.
        progress: f64,
        processed_count: usize,
        total_urls: usize,
    },
    BatchComplete {
        batch_index: usize,
        total_batches: usize,
        batch_results: Vec<UrlResult>,
    },
    ProcessingComplete {
        results: Vec<UrlResult>,
        stats: BatchStats,
    },
    ProcessingError {
        error: String,
    },
    ProcessingAborted {},
}
