use crate::tools::search::SearchProvider;
use crate::types::SearchCandidate;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{fetch_json, fetch_serp_html, is_absolute_http, squash, EngineError};

pub const NAME: &str = "brave";
const HTML_ENDPOINT: &str = "https://search.brave.com/search";
const API_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

fn extract_snippet(container: &ElementRef<'_>) -> String {
    let candidates = [
        "p.snippet-description",
        "div.snippet-description",
        "div.snippet-content",
        "p",
    ];
    for css in candidates {
        if let Ok(sel) = Selector::parse(css) {
            if let Some(n) = container.select(&sel).next() {
                let trimmed = squash(&n.text().collect::<Vec<_>>().join(" "));
                if trimmed.len() >= 20 {
                    return trimmed;
                }
            }
        }
    }
    String::new()
}

fn push_candidate(
    out: &mut Vec<SearchCandidate>,
    container: ElementRef<'_>,
    a: ElementRef<'_>,
    title_sel: &Selector,
) {
    let href = a.value().attr("href").unwrap_or("").trim();
    if !is_absolute_http(href) || href.contains("search.brave.com") {
        return;
    }
    if out.iter().any(|c| c.url == href) {
        return;
    }
    let title = a
        .select(title_sel)
        .next()
        .map(|h| squash(&h.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default();
    if title.is_empty() {
        return;
    }
    out.push(SearchCandidate {
        url: href.to_string(),
        title,
        snippet: extract_snippet(&container),
        source_provider: NAME.to_string(),
    });
}

pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchCandidate> {
    let doc = Html::parse_document(html);

    // Markup drifts; anchor on result containers, then anchors wrapping a title.
    let item_sel = Selector::parse("div.snippet[data-type='web'], div#results div.snippet").unwrap();
    let main_sel = Selector::parse("main").unwrap();
    let a_sel = Selector::parse("a[href]").unwrap();
    let title_sel = Selector::parse("h3, div.title, span.snippet-title").unwrap();

    let mut out: Vec<SearchCandidate> = Vec::new();

    for item in doc.select(&item_sel) {
        if out.len() >= max_results {
            return out;
        }
        if let Some(a) = item.select(&a_sel).find(|a| a.select(&title_sel).next().is_some()) {
            push_candidate(&mut out, item, a, &title_sel);
        }
    }

    if out.is_empty() {
        if let Some(main) = doc.select(&main_sel).next() {
            for a in main.select(&a_sel) {
                if out.len() >= max_results {
                    break;
                }
                if a.select(&title_sel).next().is_some() {
                    push_candidate(&mut out, a, a, &title_sel);
                }
            }
        }
    }

    out
}

pub fn parse_api_results(json: &serde_json::Value, max_results: usize) -> Vec<SearchCandidate> {
    let Some(items) = json
        .get("web")
        .and_then(|w| w.get("results"))
        .and_then(|r| r.as_array())
    else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let url = item.get("url").and_then(|v| v.as_str())?;
            if !is_absolute_http(url) {
                return None;
            }
            Some(SearchCandidate {
                url: url.to_string(),
                title: item
                    .get("title")
                    .and_then(|v| v.as_str())
                    .map(squash)
                    .unwrap_or_default(),
                snippet: item
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(squash)
                    .unwrap_or_default(),
                source_provider: NAME.to_string(),
            })
        })
        .take(max_results)
        .collect()
}

/// Brave Search: the API when a subscription token exists, the results page otherwise.
pub struct Brave {
    client: reqwest::Client,
    api_key: Option<String>,
    api_endpoint: String,
    html_endpoint: String,
}

impl Brave {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            api_endpoint: API_ENDPOINT.to_string(),
            html_endpoint: HTML_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoints(
        client: reqwest::Client,
        api_key: Option<String>,
        api_endpoint: impl Into<String>,
        html_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            api_endpoint: api_endpoint.into(),
            html_endpoint: html_endpoint.into(),
        }
    }

    async fn search_api(
        &self,
        key: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, EngineError> {
        let mut url = reqwest::Url::parse(&self.api_endpoint)
            .map_err(|e| EngineError::Fatal(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("count", &max_results.clamp(1, 20).to_string());

        let req = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", key);
        let json = fetch_json(req, NAME).await?;
        Ok(parse_api_results(&json, max_results))
    }

    async fn search_html(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, EngineError> {
        let mut url = reqwest::Url::parse(&self.html_endpoint)
            .map_err(|e| EngineError::Fatal(e.to_string()))?;
        url.query_pairs_mut().append_pair("q", query);

        let (_status, body) = fetch_serp_html(&self.client, url, NAME).await?;
        Ok(parse_results(&body, max_results))
    }
}

#[async_trait]
impl SearchProvider for Brave {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, EngineError> {
        let Some(key) = self.api_key.as_deref() else {
            return self.search_html(query, max_results).await;
        };
        match self.search_api(key, query, max_results).await {
            Ok(results) => Ok(results),
            Err(e) => {
                tracing::warn!("brave api failed ({}), falling back to results page", e);
                self.search_html(query, max_results).await
            }
        }
    }
}
