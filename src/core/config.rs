use crate::core::error::LinkScoutError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// EngineConfig: file-based config loader (linkscout.json) with env-var fallback
// ---------------------------------------------------------------------------

/// SERP + scrape discovery sub-config (mirrors the `enhanced_search` key in linkscout.json).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EnhancedSearchConfig {
    /// Run the query-plan → cascade → scrape pipeline at all.
    pub enabled: bool,
    /// Results requested from each provider call.
    pub max_serp_results: usize,
    /// Per-page fetch timeout for the content scraper.
    pub content_scrape_timeout_ms: u64,
    /// Fraction of search terms that must appear in a candidate page.
    pub min_keyword_match_ratio: f64,
    /// Candidates validated per query before moving on.
    pub max_retries: usize,
    /// When the SERP pipeline finds nothing, run the generic search scored by confidence.
    pub fallback_to_original_search: bool,
    pub enable_for_404: bool,
    pub enable_for_403: bool,
}

impl Default for EnhancedSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_serp_results: 5,
            content_scrape_timeout_ms: 10_000,
            min_keyword_match_ratio: 0.4,
            max_retries: 3,
            fallback_to_original_search: true,
            enable_for_404: true,
            enable_for_403: false,
        }
    }
}

impl EnhancedSearchConfig {
    pub fn content_scrape_timeout(&self) -> Duration {
        Duration::from_millis(self.content_scrape_timeout_ms.max(250))
    }
}

/// Search-provider credentials and ordering.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Google Custom Search JSON API key. Never logged.
    pub google_api_key: Option<String>,
    /// Google Programmable Search engine id (`cx`).
    pub google_cx: Option<String>,
    /// Brave Search API subscription token. Never logged.
    pub brave_api_key: Option<String>,
    /// Provider names to drop from the cascade, e.g. `["bing"]`.
    pub disabled: Vec<String>,
}

impl ProviderConfig {
    /// Google key: JSON field → `GOOGLE_CSE_API_KEY` env var → `None`.
    pub fn resolve_google_api_key(&self) -> Option<String> {
        resolve_secret(&self.google_api_key, "GOOGLE_CSE_API_KEY")
    }

    /// Google engine id: JSON field → `GOOGLE_CSE_CX` env var → `None`.
    pub fn resolve_google_cx(&self) -> Option<String> {
        resolve_secret(&self.google_cx, "GOOGLE_CSE_CX")
    }

    /// Brave token: JSON field → `BRAVE_SEARCH_API_KEY` env var → `None`.
    pub fn resolve_brave_api_key(&self) -> Option<String> {
        resolve_secret(&self.brave_api_key, "BRAVE_SEARCH_API_KEY")
    }

    pub fn is_disabled(&self, provider: &str) -> bool {
        self.disabled
            .iter()
            .any(|d| d.trim().eq_ignore_ascii_case(provider))
    }
}

fn resolve_secret(field: &Option<String>, env_key: &str) -> Option<String> {
    if let Some(v) = field {
        let v = v.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }
    std::env::var(env_key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Top-level engine config. Immutable once handed to the orchestrator; updates swap a
/// fresh copy in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// URLs processed concurrently per batch.
    pub batch_size: usize,
    /// Link-check timeout.
    pub timeout_ms: u64,
    /// Per-provider search timeout.
    pub search_timeout_ms: u64,
    /// Reachability retries on transient failures.
    pub max_retries: u32,
    pub use_cache: bool,
    /// Cached link checks older than this are ignored.
    pub cache_max_age_secs: u64,
    /// Reject candidates hosted anywhere but the broken link's domain.
    pub strict_domain_search: bool,
    /// Record the validated replacement as the fix for the link.
    pub auto_fix: bool,
    /// Minimum spacing between outbound search-provider requests.
    pub search_interval_ms: u64,
    /// Surface an unvalidated best guess (confidence × 0.7) when nothing validates.
    pub surface_best_guess: bool,
    /// Local relay used when direct requests are refused, e.g. `http://127.0.0.1:3001`.
    pub relay_url: Option<String>,
    pub enhanced_search: EnhancedSearchConfig,
    pub providers: ProviderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            timeout_ms: 10_000,
            search_timeout_ms: 8_000,
            max_retries: 2,
            use_cache: true,
            cache_max_age_secs: 3_600,
            strict_domain_search: true,
            auto_fix: false,
            search_interval_ms: 1_000,
            surface_best_guess: false,
            relay_url: None,
            enhanced_search: EnhancedSearchConfig::default(),
            providers: ProviderConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(100))
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms.max(250))
    }

    pub fn search_interval(&self) -> Duration {
        Duration::from_millis(self.search_interval_ms)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    /// Whether a broken link with this HTTP status should go through replacement discovery.
    pub fn discovery_enabled_for(&self, status: u16) -> bool {
        let es = &self.enhanced_search;
        let wanted = match status {
            404 => es.enable_for_404,
            403 => es.enable_for_403,
            _ => false,
        };
        wanted && (es.enabled || es.fallback_to_original_search)
    }

    pub fn validate(&self) -> Result<(), LinkScoutError> {
        if self.batch_size == 0 {
            return Err(LinkScoutError::Config("batch_size must be at least 1".into()));
        }
        let ratio = self.enhanced_search.min_keyword_match_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(LinkScoutError::Config(format!(
                "enhanced_search.min_keyword_match_ratio must be within [0, 1], got {}",
                ratio
            )));
        }
        if self.enhanced_search.max_serp_results == 0 {
            return Err(LinkScoutError::Config(
                "enhanced_search.max_serp_results must be at least 1".into(),
            ));
        }
        if let Some(relay) = &self.relay_url {
            url::Url::parse(relay).map_err(|e| {
                LinkScoutError::Config(format!("relay_url '{}' is not a valid url: {}", relay, e))
            })?;
        }
        Ok(())
    }
}

fn config_candidates() -> Vec<PathBuf> {
    let mut v = vec![
        PathBuf::from("linkscout.json"),
        PathBuf::from("../linkscout.json"),
    ];
    if let Some(dir) = dirs::config_dir() {
        v.push(dir.join("linkscout").join("linkscout.json"));
    }
    if let Ok(env_path) = std::env::var("LINKSCOUT_CONFIG") {
        v.insert(0, PathBuf::from(env_path));
    }
    v
}

/// Load `linkscout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `LINKSCOUT_CONFIG` env var path
/// 2. `./linkscout.json`
/// 3. `../linkscout.json`
/// 4. `<config dir>/linkscout/linkscout.json`
///
/// Missing file → `EngineConfig::default()`.
/// Parse error → log a warning, return `EngineConfig::default()`.
pub fn load_engine_config() -> EngineConfig {
    for path in &config_candidates() {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<EngineConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("linkscout.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "linkscout.json parse error at {}: {}, using defaults",
                        path.display(),
                        e
                    );
                    return EngineConfig::default();
                }
            },
            Err(_) => continue,
        }
    }

    EngineConfig::default()
}

/// Load an explicit config file; unlike [`load_engine_config`] a broken file is an error.
pub fn load_engine_config_from(path: &std::path::Path) -> anyhow::Result<EngineConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
    let cfg: EngineConfig = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("cannot parse {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}
