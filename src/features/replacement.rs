//! Replacement discovery for one broken URL: query plan, provider cascade, scoring, validation.

use crate::core::config::EngineConfig;
use crate::core::error::LinkScoutError;
use crate::nlp::confidence::{into_scored, rank_candidates, same_domain, score_candidate};
use crate::nlp::terms::terms_for_descriptor;
use crate::tools::query_plan::{fallback_queries, plan_queries, QueryScope};
use crate::tools::search::{engines::is_absolute_http, CascadeOutcome, SearchCascade};
use crate::tools::url_parts::{decompose, url_key, UrlDescriptor};
use crate::types::*;
use crate::validation::{ReplacementValidator, ValidationSettings};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Applied to the confidence of an unvalidated best guess.
pub const BEST_GUESS_PENALTY: f64 = 0.7;
const MAX_ALTERNATIVES: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct FinderOutcome {
    pub replacement: Option<ReplacementResult>,
    pub attempt: SearchAttempt,
}

enum Step {
    Found(Box<ReplacementResult>),
    Continue,
    /// Every provider is pushing back; stop querying.
    Throttled,
    /// The run was cancelled; stop at this checkpoint.
    Interrupted,
}

/// State of one discovery run.
struct Run<'a> {
    original_url: &'a str,
    desc: UrlDescriptor,
    terms: Vec<String>,
    cfg: &'a EngineConfig,
    settings: ValidationSettings,
    cancel: &'a CancellationToken,
    broken_key: String,
    tried: HashSet<String>,
    attempt: SearchAttempt,
    guess: Option<(ScoredCandidate, String, String)>,
}

impl Run<'_> {
    fn note_guess(&mut self, candidate: &ScoredCandidate, query: &str, provider: &str) {
        let better = self
            .guess
            .as_ref()
            .map_or(true, |(g, _, _)| candidate.confidence > g.confidence);
        if better {
            self.guess = Some((candidate.clone(), query.to_string(), provider.to_string()));
        }
    }

    fn interrupted(mut self) -> FinderOutcome {
        info!(
            "replacement search for {} interrupted after {} queries",
            self.original_url,
            self.attempt.queries_tried.len()
        );
        self.attempt.interrupted = true;
        FinderOutcome {
            replacement: None,
            attempt: self.attempt,
        }
    }

    fn finish(mut self, replacement: Option<ReplacementResult>) -> FinderOutcome {
        if replacement.is_none() && self.cfg.surface_best_guess {
            if let Some((c, query, provider)) = self.guess.take() {
                debug!("best guess for {}: {}", self.original_url, c.url());
                self.attempt.best_guess = Some(ReplacementResult {
                    original_url: self.original_url.to_string(),
                    replacement_url: c.url().to_string(),
                    confidence: c.confidence * BEST_GUESS_PENALTY,
                    source: ReplacementSource::BestGuess,
                    provider,
                    search_query: query,
                    validated: false,
                    validation: c.validation.get().cloned(),
                    alternatives: vec![c],
                    current_alternative_index: 0,
                    total_alternatives: 1,
                });
            }
        }
        FinderOutcome {
            replacement,
            attempt: self.attempt,
        }
    }
}

#[derive(Clone)]
pub struct ReplacementFinder {
    cascade: Arc<SearchCascade>,
    validator: ReplacementValidator,
}

impl ReplacementFinder {
    pub fn new(cascade: Arc<SearchCascade>, validator: ReplacementValidator) -> Self {
        Self { cascade, validator }
    }

    /// Look for a validated replacement for `broken_url`.
    ///
    /// Site-scoped queries run first and their results are confirmed by scraping; unscoped
    /// queries and the fallback search are ranked by confidence before validation. In strict
    /// mode hits on any other domain are dropped before scoring.
    ///
    /// `cancel` is honoured between requests, never during one: a cancelled search returns
    /// with `attempt.interrupted` set and no replacement.
    pub async fn find(
        &self,
        broken_url: &str,
        cfg: &EngineConfig,
        cancel: &CancellationToken,
    ) -> Result<FinderOutcome, LinkScoutError> {
        let desc = decompose(broken_url)
            .ok_or_else(|| LinkScoutError::MalformedUrl(broken_url.to_string()))?;
        let terms = terms_for_descriptor(&desc);
        let mut run = Run {
            original_url: broken_url,
            terms,
            cfg,
            settings: ValidationSettings::from_config(cfg),
            cancel,
            broken_key: url_key(broken_url),
            tried: HashSet::new(),
            attempt: SearchAttempt::default(),
            guess: None,
            desc,
        };
        debug!("searching replacement for {} with terms {:?}", broken_url, run.terms);

        let es = &cfg.enhanced_search;
        if es.enabled {
            for planned in plan_queries(&run.desc, cfg.strict_domain_search) {
                match self.run_query(&mut run, &planned.text, planned.scope).await {
                    Step::Found(result) => return Ok(run.finish(Some(*result))),
                    Step::Throttled => return Ok(run.finish(None)),
                    Step::Interrupted => return Ok(run.interrupted()),
                    Step::Continue => {}
                }
            }
        }

        if es.fallback_to_original_search {
            for query in fallback_queries(&run.desc) {
                if run.tried.contains(&query) {
                    continue;
                }
                match self.run_query(&mut run, &query, QueryScope::Open).await {
                    Step::Found(result) => return Ok(run.finish(Some(*result))),
                    Step::Throttled => break,
                    Step::Interrupted => return Ok(run.interrupted()),
                    Step::Continue => {}
                }
            }
        }

        info!(
            "no replacement for {} after {} queries",
            broken_url,
            run.attempt.queries_tried.len()
        );
        Ok(run.finish(None))
    }

    async fn run_query(&self, run: &mut Run<'_>, query: &str, scope: QueryScope) -> Step {
        let cancel = run.cancel;
        if cancel.is_cancelled() {
            return Step::Interrupted;
        }
        run.tried.insert(query.to_string());
        run.attempt.queries_tried.push(query.to_string());

        let cfg = run.cfg;
        let es = &cfg.enhanced_search;
        let outcome = self.cascade.search(query, es.max_serp_results, cancel).await;
        if cancel.is_cancelled() {
            return Step::Interrupted;
        }
        if let Some(summary) = outcome.error_summary() {
            run.attempt.provider_error = Some(summary);
        }
        if outcome.all_throttled() {
            warn!("all providers throttled on '{}', stopping search", query);
            return Step::Throttled;
        }
        let CascadeOutcome::Found {
            provider,
            candidates,
            ..
        } = outcome
        else {
            return Step::Continue;
        };

        let candidates: Vec<SearchCandidate> = candidates
            .into_iter()
            .filter(|c| is_absolute_http(&c.url) && url_key(&c.url) != run.broken_key)
            .collect();
        run.attempt.candidates_seen += candidates.len();

        let strict = cfg.strict_domain_search;
        let (candidates, foreign): (Vec<SearchCandidate>, Vec<SearchCandidate>) = candidates
            .into_iter()
            .partition(|c| !strict || same_domain(&run.desc, &c.url));
        if !foreign.is_empty() {
            debug!(
                "strict domain: dropped {} hits outside {} for '{}'",
                foreign.len(),
                run.desc.domain,
                query
            );
        }

        let pool: Vec<ScoredCandidate> = match scope {
            // SERP order is kept; the scrape decides.
            QueryScope::Site => candidates
                .iter()
                .map(|c| into_scored(c, &score_candidate(&run.desc, c, &run.terms, strict), &run.terms))
                .collect(),
            QueryScope::Open => rank_candidates(&run.desc, &candidates, &run.terms, strict),
        };
        if scope == QueryScope::Open {
            if let Some(top) = pool.first() {
                run.note_guess(top, query, &provider);
            }
        }

        for (idx, candidate) in pool.iter().enumerate().take(es.max_retries.max(1)) {
            if cancel.is_cancelled() {
                return Step::Interrupted;
            }
            let verdict = self
                .validator
                .validate(&run.desc, &run.terms, candidate.url(), &run.settings)
                .await;
            run.attempt.candidates_validated += 1;
            candidate.validation.fill(verdict.clone());
            if !verdict.overall_valid {
                debug!(
                    "rejected {} for {}: {}",
                    candidate.url(),
                    run.original_url,
                    verdict.reason.as_deref().unwrap_or("invalid")
                );
                continue;
            }

            let (source, confidence) = match scope {
                QueryScope::Site => (ReplacementSource::Serp, verdict.score),
                QueryScope::Open => (ReplacementSource::Confidence, candidate.confidence),
            };
            let alternatives = order_alternatives(&pool, idx);
            self.validate_in_background(run, &alternatives);
            info!(
                "replacement for {}: {} (confidence {:.2}, via {})",
                run.original_url,
                candidate.url(),
                confidence,
                provider
            );
            return Step::Found(Box::new(ReplacementResult {
                original_url: run.original_url.to_string(),
                replacement_url: candidate.url().to_string(),
                confidence,
                source,
                provider,
                search_query: query.to_string(),
                validated: true,
                validation: Some(verdict),
                total_alternatives: alternatives.len(),
                current_alternative_index: 0,
                alternatives,
            }));
        }

        Step::Continue
    }

    /// Fill the verdict slot of every alternative that has none yet. Results land in the
    /// shared slots after the replacement has already been returned.
    fn validate_in_background(&self, run: &Run<'_>, alternatives: &[ScoredCandidate]) {
        for alt in alternatives.iter().filter(|a| a.validation.get().is_none()) {
            let validator = self.validator.clone();
            let slot = alt.validation.clone();
            let url = alt.url().to_string();
            let desc = run.desc.clone();
            let terms = run.terms.clone();
            let settings = run.settings;
            let cancel = run.cancel.clone();
            tokio::spawn(async move {
                if cancel.is_cancelled() {
                    return;
                }
                slot.fill(validator.validate(&desc, &terms, &url, &settings).await);
            });
        }
    }
}

/// Winner first, then the rest in pool order, one entry per URL.
fn order_alternatives(pool: &[ScoredCandidate], winner: usize) -> Vec<ScoredCandidate> {
    let mut seen = HashSet::new();
    std::iter::once(&pool[winner])
        .chain(pool.iter().enumerate().filter(|(i, _)| *i != winner).map(|(_, c)| c))
        .filter(|c| seen.insert(url_key(c.url())))
        .take(MAX_ALTERNATIVES)
        .cloned()
        .collect()
}
