pub mod engines;
mod service;

use crate::antibot::RequestGate;
use crate::core::config::EngineConfig;
use crate::types::SearchCandidate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use engines::EngineError;
pub use service::SearchProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
    /// Rate limiting or a block page rather than an outage.
    pub throttled: bool,
}

/// What the cascade got for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOutcome {
    Found {
        provider: String,
        candidates: Vec<SearchCandidate>,
        /// Providers that errored before the winning one.
        failures: Vec<ProviderFailure>,
    },
    /// At least one provider answered, none had anything.
    NoResults { failures: Vec<ProviderFailure> },
    /// Every provider that was tried errored (or none was available).
    Failed { failures: Vec<ProviderFailure> },
}

impl CascadeOutcome {
    pub fn candidates(&self) -> &[SearchCandidate] {
        match self {
            CascadeOutcome::Found { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            CascadeOutcome::Found { failures, .. }
            | CascadeOutcome::NoResults { failures }
            | CascadeOutcome::Failed { failures } => failures,
        }
    }

    /// Every provider pushed back; further queries right now would fare no better.
    pub fn all_throttled(&self) -> bool {
        match self {
            CascadeOutcome::Failed { failures } => {
                !failures.is_empty() && failures.iter().all(|f| f.throttled)
            }
            _ => false,
        }
    }

    /// Short description of provider errors, if any.
    pub fn error_summary(&self) -> Option<String> {
        let failures = self.failures();
        if failures.is_empty() {
            return None;
        }
        Some(
            failures
                .iter()
                .map(|f| format!("{}: {}", f.provider, f.error))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Clone)]
struct CachedHit {
    provider: String,
    candidates: Vec<SearchCandidate>,
}

/// Ordered, failure-isolated list of search providers. The first provider with a non-empty
/// answer wins.
pub struct SearchCascade {
    providers: Vec<Arc<dyn SearchProvider>>,
    gate: Arc<RequestGate>,
    timeout: Duration,
    cache: moka::future::Cache<String, CachedHit>,
}

impl SearchCascade {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        gate: Arc<RequestGate>,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            gate,
            timeout,
            cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(60 * 10))
                .build(),
        }
    }

    /// The default provider order: Google CSE (keyed), DuckDuckGo instant answers,
    /// DuckDuckGo HTML, Bing HTML, Brave. Providers listed in `providers.disabled` are left out.
    pub fn from_config(client: &reqwest::Client, cfg: &EngineConfig, gate: Arc<RequestGate>) -> Self {
        let p = &cfg.providers;
        let all: Vec<Arc<dyn SearchProvider>> = vec![
            Arc::new(engines::google::GoogleCse::new(
                client.clone(),
                p.resolve_google_api_key(),
                p.resolve_google_cx(),
            )),
            Arc::new(engines::ddg_instant::DuckDuckGoInstant::new(client.clone())),
            Arc::new(engines::duckduckgo::DuckDuckGoHtml::new(client.clone())),
            Arc::new(engines::bing::BingHtml::new(client.clone())),
            Arc::new(engines::brave::Brave::new(client.clone(), p.resolve_brave_api_key())),
        ];
        let providers: Vec<_> = all.into_iter().filter(|s| !p.is_disabled(s.name())).collect();
        info!(
            "search cascade: {}",
            providers
                .iter()
                .map(|s| if s.is_configured() {
                    s.name().to_string()
                } else {
                    format!("{} (unconfigured)", s.name())
                })
                .collect::<Vec<_>>()
                .join(" → ")
        );
        Self::new(providers, gate, cfg.search_timeout())
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run `query` through the providers in order. Never fails; errors are reported in the
    /// outcome. `cancel` is checked while waiting for the request gate before each provider;
    /// when it fires there, the cascade stops and returns what it has (`Failed` with no
    /// failures when no provider ran).
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> CascadeOutcome {
        let key = format!("{}|{}", max_results, query);
        if let Some(hit) = self.cache.get(&key).await {
            debug!("search cache hit for '{}'", query);
            return CascadeOutcome::Found {
                provider: hit.provider,
                candidates: hit.candidates,
                failures: Vec::new(),
            };
        }

        let mut failures = Vec::new();
        let mut answered = false;

        for provider in &self.providers {
            if !provider.is_configured() {
                debug!("skipping {}: not configured", provider.name());
                continue;
            }
            if self.gate.wait_or_cancel(cancel).await.is_err() {
                break;
            }

            let started = std::time::Instant::now();
            // A request that has started runs to completion or timeout.
            let result = tokio::time::timeout(self.timeout, provider.search(query, max_results)).await;

            let err = match result {
                Ok(Ok(candidates)) if !candidates.is_empty() => {
                    info!(
                        "{} returned {} results for '{}' in {}ms",
                        provider.name(),
                        candidates.len(),
                        query,
                        started.elapsed().as_millis()
                    );
                    self.cache
                        .insert(
                            key,
                            CachedHit {
                                provider: provider.name().to_string(),
                                candidates: candidates.clone(),
                            },
                        )
                        .await;
                    return CascadeOutcome::Found {
                        provider: provider.name().to_string(),
                        candidates,
                        failures,
                    };
                }
                Ok(Ok(_)) => {
                    debug!("{} had no results for '{}'", provider.name(), query);
                    answered = true;
                    continue;
                }
                Ok(Err(EngineError::NotConfigured)) => continue,
                Ok(Err(e)) => e,
                Err(_) => EngineError::Transient(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                )),
            };

            warn!("engine '{}' failed for '{}': {}", provider.name(), query, err);
            failures.push(ProviderFailure {
                provider: provider.name().to_string(),
                throttled: err.is_throttle(),
                error: err.to_string(),
            });
        }

        if answered {
            CascadeOutcome::NoResults { failures }
        } else {
            if !cancel.is_cancelled() {
                warn!("all search providers failed for '{}'", query);
            }
            CascadeOutcome::Failed { failures }
        }
    }
}
