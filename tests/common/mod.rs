#![allow(dead_code)]

use async_trait::async_trait;
use linkscout::antibot::RequestGate;
use linkscout::batch::BatchOrchestrator;
use linkscout::collaborators::{CheckOptions, NoopCache, ResultCache, UrlValidator};
use linkscout::config::EngineConfig;
use linkscout::replacement::ReplacementFinder;
use linkscout::scraping::PageScraper;
use linkscout::search::{EngineError, SearchCascade, SearchProvider};
use linkscout::validation::ReplacementValidator;
use linkscout::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn check(status: u16) -> UrlCheck {
    UrlCheck {
        status,
        status_text: String::new(),
        response_time_ms: 3,
        headers: BTreeMap::new(),
        timestamp: chrono::Utc::now(),
        final_url: None,
    }
}

pub fn hit(url: &str, title: &str) -> SearchCandidate {
    SearchCandidate {
        url: url.into(),
        title: title.into(),
        snippet: String::new(),
        source_provider: "scripted".into(),
    }
}

pub fn records(urls: &[&str]) -> Vec<UrlRecord> {
    urls.iter()
        .enumerate()
        .map(|(i, u)| UrlRecord::new(format!("r{}", i), *u))
        .collect()
}

/// Search provider answering every query with the same hits, optionally cancelling a token
/// while it answers.
pub struct ScriptedProvider {
    pub hits: Vec<SearchCandidate>,
    pub queries: Mutex<Vec<String>>,
    pub cancel_on_query: Option<CancellationToken>,
}

impl ScriptedProvider {
    pub fn new(hits: Vec<SearchCandidate>) -> Arc<Self> {
        Arc::new(Self {
            hits,
            queries: Mutex::new(Vec::new()),
            cancel_on_query: None,
        })
    }

    pub fn cancelling(hits: Vec<SearchCandidate>, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            hits,
            queries: Mutex::new(Vec::new()),
            cancel_on_query: Some(token),
        })
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, query: &str, _max: usize) -> Result<Vec<SearchCandidate>, EngineError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(token) = &self.cancel_on_query {
            token.cancel();
        }
        Ok(self.hits.clone())
    }
}

/// Link checker with per-URL statuses (200 for anything unlisted), call accounting, an
/// optional delay, an optional hold that blocks checks until released, and an optional token
/// to cancel after a number of calls.
#[derive(Default)]
pub struct FakeChecker {
    pub statuses: HashMap<String, u16>,
    pub delay: Option<Duration>,
    pub hold: Option<Arc<Semaphore>>,
    pub cancel_after: Option<(usize, CancellationToken)>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeChecker {
    pub fn with_statuses(statuses: &[(&str, u16)]) -> Self {
        Self {
            statuses: statuses.iter().map(|(u, s)| (u.to_string(), *s)).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl UrlValidator for FakeChecker {
    async fn validate_url(&self, url: &str, _opts: CheckOptions) -> Result<UrlCheck, LinkScoutError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((after, token)) = &self.cancel_after {
            if n >= *after {
                token.cancel();
            }
        }
        if let Some(hold) = &self.hold {
            let _permit = hold.acquire().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(check(self.statuses.get(url).copied().unwrap_or(200)))
    }
}

/// Scraper serving fixed text per URL; unknown URLs fail to scrape.
#[derive(Default)]
pub struct FakePages(pub HashMap<String, String>);

impl FakePages {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self(
            pages
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_string()))
                .collect(),
        )
    }
}

#[async_trait]
impl PageScraper for FakePages {
    async fn scrape(&self, url: &str, _timeout: Duration) -> Result<ScrapedPage, LinkScoutError> {
        let body = self
            .0
            .get(url)
            .cloned()
            .ok_or_else(|| LinkScoutError::ScrapeRejected(format!("no page for {}", url)))?;
        Ok(ScrapedPage {
            url: url.to_string(),
            title: String::new(),
            meta_description: String::new(),
            headings: Vec::new(),
            main_content: body.to_lowercase(),
            method: ExtractionMethod::Container,
            status_code: 200,
        })
    }
}

pub fn cascade_of(providers: Vec<Arc<dyn SearchProvider>>) -> Arc<SearchCascade> {
    Arc::new(SearchCascade::new(
        providers,
        Arc::new(RequestGate::new(Duration::ZERO)),
        Duration::from_secs(2),
    ))
}

pub fn orchestrator(
    checker: Arc<FakeChecker>,
    provider: Arc<ScriptedProvider>,
    pages: FakePages,
    cfg: EngineConfig,
) -> BatchOrchestrator {
    let cache: Arc<dyn ResultCache> = Arc::new(NoopCache);
    let finder = ReplacementFinder::new(
        cascade_of(vec![provider as Arc<dyn SearchProvider>]),
        ReplacementValidator::new(checker.clone(), Arc::new(pages)),
    );
    BatchOrchestrator::new(checker, cache, finder, cfg)
}
