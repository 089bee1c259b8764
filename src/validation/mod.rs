pub mod domain;
pub mod http_check;
pub mod relay;

use crate::core::collaborators::{CheckOptions, UrlValidator};
use crate::core::config::EngineConfig;
use crate::nlp::keyword::score_keywords;
use crate::scraping::PageScraper;
use crate::tools::url_parts::{domain_of, UrlDescriptor};
use crate::types::ValidationVerdict;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub use domain::domain_relevance;
pub use http_check::{HttpUrlValidator, LinearBackoff};
pub use relay::RelayClient;

pub const MIN_DOMAIN_RELEVANCE: f64 = 0.3;
pub const MIN_CONTENT_RELEVANCE: f64 = 0.4;

const DOMAIN_WEIGHT: f64 = 0.3;
const ACCESS_WEIGHT: f64 = 0.3;
const CONTENT_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy)]
pub struct ValidationSettings {
    pub check_timeout: Duration,
    pub scrape_timeout: Duration,
    pub min_keyword_match_ratio: f64,
    pub use_cache: bool,
}

impl ValidationSettings {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            check_timeout: cfg.timeout(),
            scrape_timeout: cfg.enhanced_search.content_scrape_timeout(),
            min_keyword_match_ratio: cfg.enhanced_search.min_keyword_match_ratio,
            use_cache: cfg.use_cache,
        }
    }
}

fn weighted(domain: f64, access: f64, content: f64) -> f64 {
    (DOMAIN_WEIGHT * domain + ACCESS_WEIGHT * access + CONTENT_WEIGHT * content).clamp(0.0, 1.0)
}

/// Two-phase gate for a replacement candidate: reachability, then relevance of its content to
/// the broken link.
#[derive(Clone)]
pub struct ReplacementValidator {
    checker: Arc<dyn UrlValidator>,
    scraper: Arc<dyn PageScraper>,
}

impl ReplacementValidator {
    pub fn new(checker: Arc<dyn UrlValidator>, scraper: Arc<dyn PageScraper>) -> Self {
        Self { checker, scraper }
    }

    pub async fn validate(
        &self,
        original: &UrlDescriptor,
        terms: &[String],
        candidate_url: &str,
        settings: &ValidationSettings,
    ) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::default();

        // Phase 1: reachability.
        let opts = CheckOptions {
            timeout: settings.check_timeout,
            use_cache: settings.use_cache,
        };
        let check = match self.checker.validate_url(candidate_url, opts).await {
            Ok(check) => check,
            Err(e) => {
                verdict.reason = Some(format!("unreachable: {}", e));
                debug!("candidate {} failed phase 1: {}", candidate_url, e);
                return verdict;
            }
        };
        verdict.http_status = Some(check.status);
        verdict.accessibility_score = if check.is_success() {
            1.0
        } else if check.is_redirect() {
            0.8
        } else {
            verdict.reason = Some(format!("http status {}", check.status));
            debug!("candidate {} answered {}", candidate_url, check.status);
            return verdict;
        };
        verdict.http_valid = true;

        // Phase 2: relevance.
        let candidate_domain = domain_of(candidate_url).unwrap_or_default();
        verdict.domain_relevance = domain_relevance(&original.domain, &candidate_domain);
        if verdict.domain_relevance < MIN_DOMAIN_RELEVANCE {
            verdict.score = weighted(verdict.domain_relevance, verdict.accessibility_score, 0.0);
            verdict.reason = Some(format!(
                "domain {} too far from {} ({:.2})",
                candidate_domain, original.domain, verdict.domain_relevance
            ));
            return verdict;
        }

        if terms.is_empty() {
            return self.degraded(verdict, "no search terms to match content against");
        }

        let page = match self.scraper.scrape(candidate_url, settings.scrape_timeout).await {
            Ok(page) => page,
            Err(e) => return self.degraded(verdict, &format!("content unavailable: {}", e)),
        };

        let keywords = score_keywords(terms, &page, Some(original), settings.min_keyword_match_ratio);
        verdict.content_score = keywords.normalized_score;
        verdict.content_relevant =
            keywords.matched && keywords.normalized_score >= MIN_CONTENT_RELEVANCE;
        verdict.score = weighted(
            verdict.domain_relevance,
            verdict.accessibility_score,
            verdict.content_score,
        );
        verdict.overall_valid = verdict.content_relevant;
        if !verdict.content_relevant {
            verdict.reason = Some(format!(
                "content not relevant ({} of {} terms, score {:.2})",
                keywords.matched_terms.len(),
                keywords.term_count,
                keywords.normalized_score
            ));
        }

        info!(
            "validated {}: valid={} score={:.2} (domain {:.2}, content {:.2})",
            candidate_url,
            verdict.overall_valid,
            verdict.score,
            verdict.domain_relevance,
            verdict.content_score
        );
        verdict
    }

    /// Reachability passed but content could not be judged.
    fn degraded(&self, mut verdict: ValidationVerdict, reason: &str) -> ValidationVerdict {
        debug!("degraded verdict: {}", reason);
        verdict.degraded = true;
        verdict.overall_valid = true;
        verdict.score = weighted(verdict.domain_relevance, verdict.accessibility_score, 0.0);
        verdict.reason = Some(reason.to_string());
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LinkScoutError;
    use crate::tools::url_parts::decompose;
    use crate::types::{ExtractionMethod, ScrapedPage, UrlCheck};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct FixedStatus(Result<u16, LinkScoutError>);

    #[async_trait]
    impl UrlValidator for FixedStatus {
        async fn validate_url(&self, _url: &str, _o: CheckOptions) -> Result<UrlCheck, LinkScoutError> {
            let status = self.0.clone()?;
            Ok(UrlCheck {
                status,
                status_text: String::new(),
                response_time_ms: 5,
                headers: BTreeMap::new(),
                timestamp: chrono::Utc::now(),
                final_url: None,
            })
        }
    }

    struct FixedPage(Result<&'static str, LinkScoutError>);

    #[async_trait]
    impl PageScraper for FixedPage {
        async fn scrape(&self, url: &str, _t: Duration) -> Result<ScrapedPage, LinkScoutError> {
            let body = self.0.clone()?;
            Ok(ScrapedPage {
                url: url.to_string(),
                title: String::new(),
                meta_description: String::new(),
                headings: Vec::new(),
                main_content: body.to_string(),
                method: ExtractionMethod::Container,
                status_code: 200,
            })
        }
    }

    fn settings() -> ValidationSettings {
        ValidationSettings {
            check_timeout: Duration::from_secs(1),
            scrape_timeout: Duration::from_secs(1),
            min_keyword_match_ratio: 0.4,
            use_cache: false,
        }
    }

    fn validator(status: Result<u16, LinkScoutError>, page: Result<&'static str, LinkScoutError>) -> ReplacementValidator {
        ReplacementValidator::new(Arc::new(FixedStatus(status)), Arc::new(FixedPage(page)))
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unreachable_skips_phase_two() {
        let orig = decompose("https://example.com/old/guide.html").unwrap();
        let v = validator(Ok(404), Ok("never read"));
        let verdict = v
            .validate(&orig, &terms(&["guide"]), "https://example.com/new/guide", &settings())
            .await;
        assert!(!verdict.http_valid);
        assert!(!verdict.overall_valid);
        assert_eq!(verdict.content_score, 0.0);
        assert_eq!(verdict.http_status, Some(404));

        let v = validator(Err(LinkScoutError::Timeout(Duration::from_secs(1))), Ok(""));
        let verdict = v
            .validate(&orig, &terms(&["guide"]), "https://example.com/new/guide", &settings())
            .await;
        assert!(!verdict.overall_valid);
        assert!(verdict.reason.unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_relevant_content_passes() {
        let orig = decompose("https://example.com/old/deployment-guide.html").unwrap();
        let v = validator(
            Ok(200),
            Ok("the deployment guide explains every step of shipping the application to production"),
        );
        let verdict = v
            .validate(
                &orig,
                &terms(&["deployment", "guide"]),
                "https://example.com/docs/deployment-guide",
                &settings(),
            )
            .await;
        assert!(verdict.overall_valid);
        assert!(verdict.content_relevant);
        assert!(!verdict.degraded);
        let expected = 0.3 * 1.0 + 0.3 * 1.0 + 0.4 * verdict.content_score;
        assert!((verdict.score - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_irrelevant_content_fails() {
        let orig = decompose("https://example.com/old/deployment-guide.html").unwrap();
        let v = validator(
            Ok(200),
            Ok("our bakery sells sourdough bread and pastries every morning of the week"),
        );
        let verdict = v
            .validate(
                &orig,
                &terms(&["deployment", "guide"]),
                "https://example.com/bakery",
                &settings(),
            )
            .await;
        assert!(verdict.http_valid);
        assert!(!verdict.content_relevant);
        assert!(!verdict.overall_valid);
    }

    #[tokio::test]
    async fn test_scrape_failure_degrades_to_reachability() {
        let orig = decompose("https://example.com/old/guide.html").unwrap();
        let v = validator(
            Ok(301),
            Err(LinkScoutError::ScrapeRejected("not html".into())),
        );
        let verdict = v
            .validate(&orig, &terms(&["guide"]), "https://example.com/guide", &settings())
            .await;
        assert!(verdict.degraded);
        assert!(verdict.overall_valid);
        assert_eq!(verdict.accessibility_score, 0.8);
        assert!((verdict.score - (0.3 + 0.3 * 0.8)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_foreign_domain_rejected() {
        let orig = decompose("https://example.com/old/guide.html").unwrap();
        let v = validator(Ok(200), Ok("guide guide guide guide guide guide guide guide guide guide"));
        let verdict = v
            .validate(&orig, &terms(&["guide"]), "https://unrelated.org/guide", &settings())
            .await;
        assert!(!verdict.overall_valid);
        assert_eq!(verdict.domain_relevance, 0.0);
    }
}
