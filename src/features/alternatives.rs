//! Ranked replacement alternatives per broken URL. The tracker owns the `ReplacementResult`
//! for each URL and is the only thing that moves it to another alternative.

use crate::tools::url_parts::url_key;
use crate::types::{ReplacementResult, ReplacementSource, ScoredCandidate};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Where the cursor sits for one broken URL, with the replacement as it now reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeView {
    pub candidate: ScoredCandidate,
    pub index: usize,
    pub total: usize,
    pub replacement: ReplacementResult,
}

#[derive(Clone, Default)]
pub struct AlternativeTracker {
    slots: Arc<RwLock<HashMap<String, ReplacementResult>>>,
}

impl AlternativeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a fresh discovery for `replacement.original_url`, replacing any
    /// earlier one and starting at its first alternative. No alternatives forgets the URL.
    pub async fn record(&self, mut replacement: ReplacementResult) {
        let key = url_key(&replacement.original_url);
        let mut slots = self.slots.write().await;
        if replacement.alternatives.is_empty() {
            slots.remove(&key);
            return;
        }
        debug!(
            "tracking {} alternatives for {}",
            replacement.alternatives.len(),
            replacement.original_url
        );
        replacement.current_alternative_index = 0;
        replacement.total_alternatives = replacement.alternatives.len();
        slots.insert(key, replacement);
    }

    pub async fn current(&self, original_url: &str) -> Option<AlternativeView> {
        let slots = self.slots.read().await;
        view(slots.get(&url_key(original_url))?)
    }

    /// The tracked replacement for `original_url`, pointing at the current alternative.
    pub async fn replacement(&self, original_url: &str) -> Option<ReplacementResult> {
        self.slots.read().await.get(&url_key(original_url)).cloned()
    }

    /// Advance to the next alternative and point the replacement at it. At the end of the
    /// list returns `None` and leaves everything as it was.
    pub async fn next(&self, original_url: &str) -> Option<AlternativeView> {
        let mut slots = self.slots.write().await;
        let replacement = slots.get_mut(&url_key(original_url))?;
        let next = replacement.current_alternative_index + 1;
        if next >= replacement.alternatives.len() {
            return None;
        }
        point_at(replacement, next);
        view(replacement)
    }

    /// The alternative under the cursor, confirmed as the chosen one. The cursor stays put.
    pub async fn accept(&self, original_url: &str) -> Option<AlternativeView> {
        let view = self.current(original_url).await?;
        debug!(
            "accepted alternative {}/{} for {}: {}",
            view.index + 1,
            view.total,
            original_url,
            view.candidate.url()
        );
        Some(view)
    }

    pub async fn forget(&self, original_url: &str) {
        self.slots.write().await.remove(&url_key(original_url));
    }

    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

/// Move `replacement` onto alternative `index`. `validated` follows that alternative's own
/// verdict, which may still be pending.
fn point_at(replacement: &mut ReplacementResult, index: usize) {
    let Some(candidate) = replacement.alternatives.get(index) else {
        return;
    };
    let verdict = candidate.validation.get().cloned();
    replacement.replacement_url = candidate.url().to_string();
    replacement.confidence = match (replacement.source, &verdict) {
        (ReplacementSource::Serp, Some(v)) => v.score,
        _ => candidate.confidence,
    };
    replacement.validated = verdict.as_ref().is_some_and(|v| v.overall_valid);
    replacement.validation = verdict;
    replacement.current_alternative_index = index;
}

fn view(replacement: &ReplacementResult) -> Option<AlternativeView> {
    let index = replacement.current_alternative_index;
    replacement.alternatives.get(index).map(|c| AlternativeView {
        candidate: c.clone(),
        index,
        total: replacement.alternatives.len(),
        replacement: replacement.clone(),
    })
}
