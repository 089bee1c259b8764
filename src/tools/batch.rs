use crate::core::collaborators::{CheckOptions, ResultCache, UrlValidator};
use crate::core::config::EngineConfig;
use crate::core::error::LinkScoutError;
use crate::features::alternatives::{AlternativeTracker, AlternativeView};
use crate::features::replacement::{FinderOutcome, ReplacementFinder};
use crate::types::*;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Processing,
    Completed,
    Error,
    Aborted,
}

/// What `process_urls` hands back once the run is over. The same results went out as events.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job_id: Uuid,
    pub state: RunState,
    pub results: Vec<UrlResult>,
    pub stats: BatchStats,
}

/// Clears the busy flag and the run token however the run ends. A run dropped before it
/// reached a terminal state counts as aborted.
struct RunGuard<'a> {
    orchestrator: &'a BatchOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.orchestrator.run_token) = None;
        let mut state = lock(&self.orchestrator.state);
        if *state == RunState::Processing {
            *state = RunState::Aborted;
        }
        drop(state);
        self.orchestrator.busy.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Checks a list of links in fixed-size batches and looks for replacements for the broken
/// ones. One run at a time; a second `process_urls` while busy fails with `AlreadyInProgress`.
pub struct BatchOrchestrator {
    validator: Arc<dyn UrlValidator>,
    cache: Arc<dyn ResultCache>,
    finder: ReplacementFinder,
    alternatives: AlternativeTracker,
    config: RwLock<Arc<EngineConfig>>,
    busy: AtomicBool,
    state: Mutex<RunState>,
    run_token: Mutex<Option<CancellationToken>>,
}

impl BatchOrchestrator {
    pub fn new(
        validator: Arc<dyn UrlValidator>,
        cache: Arc<dyn ResultCache>,
        finder: ReplacementFinder,
        config: EngineConfig,
    ) -> Self {
        Self {
            validator,
            cache,
            finder,
            alternatives: AlternativeTracker::new(),
            config: RwLock::new(Arc::new(config)),
            busy: AtomicBool::new(false),
            state: Mutex::new(RunState::Idle),
            run_token: Mutex::new(None),
        }
    }

    /// Snapshot of the current config. A running batch keeps the snapshot it started with.
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_config(&self, cfg: EngineConfig) -> Result<(), LinkScoutError> {
        cfg.validate()?;
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(cfg);
        info!("engine config updated");
        Ok(())
    }

    /// `Idle` before the first run, `Processing` during one, then the way the last run ended
    /// (`Completed`, `Error` or `Aborted`) until the next one starts.
    pub fn state(&self) -> RunState {
        *lock(&self.state)
    }

    pub fn is_processing(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Cancel the active run, if any. Returns whether there was one.
    pub fn abort(&self) -> bool {
        match lock(&self.run_token).as_ref() {
            Some(token) => {
                info!("abort requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn alternatives(&self) -> &AlternativeTracker {
        &self.alternatives
    }

    pub async fn current_alternative(&self, original_url: &str) -> Option<AlternativeView> {
        self.alternatives.current(original_url).await
    }

    pub async fn next_alternative(&self, original_url: &str) -> Option<AlternativeView> {
        self.alternatives.next(original_url).await
    }

    pub async fn accept_alternative(&self, original_url: &str) -> Option<AlternativeView> {
        self.alternatives.accept(original_url).await
    }

    /// The replacement for `original_url` as the alternative cursor currently has it.
    pub async fn replacement_for(&self, original_url: &str) -> Option<ReplacementResult> {
        self.alternatives.replacement(original_url).await
    }

    /// Run one job over `records`, sending progress to `events`.
    ///
    /// `cancel`, when given, becomes the parent of the run's own token: cancelling either one
    /// aborts the run. Links already in flight finish their current request; a link whose
    /// replacement search was cut short carries `search_attempt.interrupted`, and links that
    /// never started are left out (`stats.processed < stats.total`). An aborted run still
    /// returns `Ok` with the results gathered so far.
    pub async fn process_urls(
        &self,
        records: Vec<UrlRecord>,
        events: &UnboundedSender<BatchEvent>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchReport, LinkScoutError> {
        let cfg = self.config();
        cfg.validate()?;

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LinkScoutError::AlreadyInProgress);
        }
        let _guard = RunGuard { orchestrator: self };
        *lock(&self.state) = RunState::Processing;

        let token = cancel.map(|c| c.child_token()).unwrap_or_default();
        *lock(&self.run_token) = Some(token.clone());

        let job_id = Uuid::new_v4();
        let started = Instant::now();
        let total = records.len();
        let batch_size = cfg.batch_size;
        let total_batches = total.div_ceil(batch_size);
        info!(
            "job {}: {} urls in {} batches of {}",
            job_id, total, total_batches, batch_size
        );
        emit(
            events,
            BatchEvent::ProcessingStarted {
                job_id,
                total_urls: total,
            },
        );

        let mut results: Vec<UrlResult> = Vec::with_capacity(total);
        let mut state = RunState::Completed;

        'batches: for (batch_index, batch) in records.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                break;
            }
            debug!("job {}: batch {}/{}", job_id, batch_index + 1, total_batches);

            let mut batch_results = Vec::with_capacity(batch.len());
            let mut pipelines = stream::iter(batch.iter().cloned())
                .map(|record| {
                    let url = record.original_url.clone();
                    AssertUnwindSafe(self.process_one(record, &cfg, &token))
                        .catch_unwind()
                        .map(move |r| (url, r))
                })
                .buffer_unordered(batch_size);

            while let Some((url, outcome)) = pipelines.next().await {
                match outcome {
                    Ok(Some(result)) => {
                        results.push(result.clone());
                        batch_results.push(result.clone());
                        emit(
                            events,
                            BatchEvent::UrlProcessed {
                                result: Box::new(result),
                                progress: results.len() as f64 * 100.0 / total as f64,
                                processed_count: results.len(),
                                total_urls: total,
                            },
                        );
                    }
                    Ok(None) => {}
                    Err(_) => {
                        error!("job {}: pipeline for {} panicked", job_id, url);
                        emit(
                            events,
                            BatchEvent::ProcessingError {
                                error: format!("internal error while processing {}", url),
                            },
                        );
                        state = RunState::Error;
                        break 'batches;
                    }
                }
            }

            emit(
                events,
                BatchEvent::BatchComplete {
                    batch_index,
                    total_batches,
                    batch_results,
                },
            );
        }

        if state != RunState::Error && token.is_cancelled() {
            state = RunState::Aborted;
        }
        let stats = BatchStats::from_results(total, &results, started.elapsed().as_millis() as u64);
        *lock(&self.state) = state;
        match state {
            RunState::Aborted => {
                warn!(
                    "job {} aborted after {}/{} urls",
                    job_id,
                    results.len(),
                    total
                );
                emit(events, BatchEvent::ProcessingAborted {});
            }
            RunState::Completed => {
                info!(
                    "job {} complete: {} valid, {} invalid, {} replaced in {}ms",
                    job_id, stats.valid, stats.invalid, stats.replaced, stats.duration_ms
                );
                emit(
                    events,
                    BatchEvent::ProcessingComplete {
                        results: results.clone(),
                        stats: stats.clone(),
                    },
                );
            }
            _ => {}
        }

        Ok(BatchReport {
            job_id,
            state,
            results,
            stats,
        })
    }

    /// Check one link and, when it is broken in an eligible way, look for a replacement.
    /// `None` when the run was cancelled before this link started.
    async fn process_one(
        &self,
        record: UrlRecord,
        cfg: &EngineConfig,
        token: &CancellationToken,
    ) -> Option<UrlResult> {
        if token.is_cancelled() {
            return None;
        }
        let started = Instant::now();
        let url = record.original_url.trim().to_string();
        let mut result = UrlResult {
            record,
            status: UrlStatus::Error,
            http_status: None,
            status_text: String::new(),
            response_time_ms: 0,
            cache_hit: false,
            error: None,
            replacement: None,
            search_attempt: None,
            fixed_url: None,
        };

        match url::Url::parse(&url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(parsed) => {
                debug!("skipping {} link {}", parsed.scheme(), url);
                result.status = UrlStatus::Skipped;
                return Some(result);
            }
            Err(e) => {
                result.error = Some(LinkScoutError::MalformedUrl(format!("{}: {}", url, e)).to_string());
                return Some(result);
            }
        }

        let cached = if cfg.use_cache {
            self.cache.get(&url, cfg.cache_max_age()).await
        } else {
            None
        };
        let check = match cached {
            Some(check) => {
                result.cache_hit = true;
                check
            }
            None => {
                let opts = CheckOptions {
                    timeout: cfg.timeout(),
                    use_cache: cfg.use_cache,
                };
                match self.validator.validate_url(&url, opts).await {
                    Ok(check) => {
                        if cfg.use_cache {
                            self.cache.put(&url, check.clone()).await;
                        }
                        check
                    }
                    Err(e) => {
                        debug!("check failed for {}: {}", url, e);
                        result.error = Some(e.to_string());
                        result.response_time_ms = started.elapsed().as_millis() as u64;
                        return Some(result);
                    }
                }
            }
        };

        result.http_status = Some(check.status);
        result.status_text = check.status_text.clone();
        result.response_time_ms = check.response_time_ms;
        result.status = if check.is_success() {
            UrlStatus::Valid
        } else if check.is_redirect() {
            UrlStatus::Redirect
        } else {
            UrlStatus::Invalid
        };

        if result.status != UrlStatus::Invalid || !cfg.discovery_enabled_for(check.status) {
            return Some(result);
        }

        if token.is_cancelled() {
            debug!("run cancelled before searching a replacement for {}", url);
            result.search_attempt = Some(SearchAttempt {
                interrupted: true,
                ..Default::default()
            });
            return Some(result);
        }

        match self.finder.find(&url, cfg, token).await {
            Ok(FinderOutcome {
                replacement: Some(replacement),
                ..
            }) => {
                self.alternatives.record(replacement.clone()).await;
                if cfg.auto_fix {
                    result.fixed_url = Some(replacement.replacement_url.clone());
                }
                result.replacement = Some(replacement);
            }
            Ok(FinderOutcome { attempt, .. }) => {
                // An interrupted search proved nothing; earlier alternatives stay.
                if !attempt.interrupted {
                    self.alternatives.forget(&url).await;
                }
                result.search_attempt = Some(attempt);
            }
            Err(e) => {
                warn!("replacement search for {} failed: {}", url, e);
                result.search_attempt = Some(SearchAttempt {
                    provider_error: Some(e.to_string()),
                    ..Default::default()
                });
            }
        }
        Some(result)
    }
}

fn emit(events: &UnboundedSender<BatchEvent>, event: BatchEvent) {
    if events.send(event).is_err() {
        debug!("event receiver dropped");
    }
}
