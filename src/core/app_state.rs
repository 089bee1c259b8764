use crate::antibot::{self, RequestGate};
use crate::core::collaborators::{MemoryResultCache, NoopCache, ResultCache, UrlValidator};
use crate::core::config::EngineConfig;
use crate::core::error::LinkScoutError;
use crate::features::replacement::ReplacementFinder;
use crate::scraping::{PageScraper, RustScraper};
use crate::tools::batch::BatchOrchestrator;
use crate::tools::search::SearchCascade;
use crate::validation::{HttpUrlValidator, RelayClient, ReplacementValidator};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything a run needs, wired from one config.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub gate: Arc<RequestGate>,
    pub cascade: Arc<SearchCascade>,
    pub scraper: Arc<dyn PageScraper>,
    pub link_checker: Arc<dyn UrlValidator>,
    pub result_cache: Arc<dyn ResultCache>,
    pub orchestrator: Arc<BatchOrchestrator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("providers", &self.cascade.provider_names())
            .field("search_interval", &self.gate.interval())
            .field("processing", &self.orchestrator.is_processing())
            .finish()
    }
}

/// Shared client. `HTTP_CONNECT_TIMEOUT_SECS` overrides the connect timeout; per-request
/// timeouts come from the config.
pub fn build_http_client() -> Result<reqwest::Client, LinkScoutError> {
    let connect_timeout = env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout))
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(antibot::get_random_user_agent())
        .build()
        .map_err(|e| LinkScoutError::Config(format!("http client: {}", e)))
}

impl AppState {
    pub fn new(http_client: reqwest::Client, config: EngineConfig) -> Result<Self, LinkScoutError> {
        config.validate()?;

        let gate = Arc::new(RequestGate::new(config.search_interval()));
        let cascade = Arc::new(SearchCascade::from_config(&http_client, &config, gate.clone()));
        let scraper: Arc<dyn PageScraper> = Arc::new(RustScraper::new(http_client.clone()));

        let mut checker = HttpUrlValidator::new(http_client.clone(), config.max_retries);
        if let Some(relay) = config.relay_url.as_deref() {
            info!("relay fallback enabled at {}", relay);
            checker = checker.with_relay(RelayClient::new(http_client.clone(), relay)?);
        }
        let link_checker: Arc<dyn UrlValidator> = Arc::new(checker);

        let result_cache: Arc<dyn ResultCache> = if config.use_cache {
            Arc::new(MemoryResultCache::default())
        } else {
            Arc::new(NoopCache)
        };

        let finder = ReplacementFinder::new(
            cascade.clone(),
            ReplacementValidator::new(link_checker.clone(), scraper.clone()),
        );
        let orchestrator = Arc::new(BatchOrchestrator::new(
            link_checker.clone(),
            result_cache.clone(),
            finder,
            config,
        ));

        Ok(Self {
            http_client,
            gate,
            cascade,
            scraper,
            link_checker,
            result_cache,
            orchestrator,
        })
    }

    /// Convenience for the binary: shared client plus the config found on disk.
    pub fn from_env() -> Result<Self, LinkScoutError> {
        Self::new(build_http_client()?, crate::core::config::load_engine_config())
    }
}
