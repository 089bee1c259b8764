mod clean;
mod metadata;
mod parse;
mod quality;

use crate::antibot;
use crate::core::error::LinkScoutError;
use crate::types::*;
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub use quality::MIN_CONTENT_CHARS;

/// Fetches a page and reduces it to the text the keyword scorer reads.
#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, url: &str, timeout: Duration) -> Result<ScrapedPage, LinkScoutError>;
}

/// Rust-native scraper: a plain HTTP fetch with browser-like headers, then structured
/// extraction with body-text and regex fallbacks.
pub struct RustScraper {
    client: Client,
    cache: moka::future::Cache<String, ScrapedPage>,
}

impl RustScraper {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(60 * 30))
                .build(),
        }
    }

    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<(u16, String), LinkScoutError> {
        let request_builder = antibot::stealth_request(self.client.get(url.clone())).timeout(timeout);

        let response = request_builder
            .send()
            .await
            .map_err(|e| LinkScoutError::from_reqwest(&e, timeout))?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(LinkScoutError::ScrapeRejected(format!(
                "http status {}",
                status_code
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        if !is_html_content_type(&content_type) {
            return Err(LinkScoutError::ScrapeRejected(format!(
                "not html: {}",
                content_type
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| LinkScoutError::from_reqwest(&e, timeout))?;
        Ok((status_code, html))
    }

    /// Structured extraction with fallbacks. Pure; used directly by tests.
    pub fn extract(&self, html: &str, url: &str, status_code: u16) -> Result<ScrapedPage, LinkScoutError> {
        let document = Html::parse_document(html);

        let title = clean::normalize_text(&self.extract_title(&document));
        let meta_description = clean::normalize_text(&self.extract_meta_description(&document));
        let headings = self.extract_headings(&document);

        let (main_content, method) = match self.extract_container_text(&document) {
            Some(text) => (text, ExtractionMethod::Container),
            None => {
                let body = self.extract_body_text(&document);
                if quality::is_substantial(&body) {
                    (body, ExtractionMethod::Body)
                } else {
                    debug!("structured extraction empty for {}, stripping tags", url);
                    (clean::strip_tags(html), ExtractionMethod::Regex)
                }
            }
        };

        quality::check_content(&main_content)?;

        Ok(ScrapedPage {
            url: url.to_string(),
            title,
            meta_description,
            headings,
            main_content,
            method,
            status_code,
        })
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type.contains("text/html") || content_type.contains("application/xhtml")
}

#[async_trait]
impl PageScraper for RustScraper {
    async fn scrape(&self, url: &str, timeout: Duration) -> Result<ScrapedPage, LinkScoutError> {
        if let Some(page) = self.cache.get(url).await {
            debug!("scrape cache hit: {}", url);
            return Ok(page);
        }

        let parsed_url =
            Url::parse(url).map_err(|e| LinkScoutError::MalformedUrl(format!("{}: {}", url, e)))?;
        if parsed_url.scheme() != "http" && parsed_url.scheme() != "https" {
            return Err(LinkScoutError::MalformedUrl(format!(
                "{}: only http(s) can be scraped",
                url
            )));
        }

        let (status_code, html) = self.fetch(&parsed_url, timeout).await?;
        let page = self.extract(&html, url, status_code)?;
        info!(
            "scraped {} ({:?}, {} chars, {} headings)",
            url,
            page.method,
            page.main_content.len(),
            page.headings.len()
        );
        self.cache.insert(url.to_string(), page.clone()).await;
        Ok(page)
    }
}
