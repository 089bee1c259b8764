use crate::tools::search::SearchProvider;
use crate::types::SearchCandidate;
use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{fetch_serp_html, is_absolute_http, squash, EngineError};

pub const NAME: &str = "duckduckgo";
const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

fn normalize_ddg_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    // Protocol-relative URLs.
    let candidate = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    // Redirect link: the real destination is in `uddg`.
    if let Ok(url) = url::Url::parse(&candidate) {
        let is_ddg = matches!(
            url.host_str(),
            Some("duckduckgo.com") | Some("html.duckduckgo.com")
        );
        if is_ddg && url.path().starts_with("/l/") {
            return url
                .query_pairs()
                .find(|(k, v)| k == "uddg" && !v.trim().is_empty())
                .map(|(_, v)| v.to_string());
        }
        if is_ddg {
            return None;
        }
    }

    is_absolute_http(&candidate).then_some(candidate)
}

pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchCandidate> {
    let doc = Html::parse_document(html);
    let sel_item = Selector::parse("div.result, div.results_links").unwrap();
    let sel_link = Selector::parse("a.result__a").unwrap();
    let sel_snip = Selector::parse("a.result__snippet, div.result__snippet").unwrap();

    let mut out: Vec<SearchCandidate> = Vec::new();
    for item in doc.select(&sel_item) {
        if out.len() >= max_results {
            break;
        }

        let Some(link) = item.select(&sel_link).next() else {
            continue;
        };
        let Some(href) = normalize_ddg_href(link.value().attr("href").unwrap_or("")) else {
            continue;
        };
        // `div.result` and `div.results_links` can both wrap the same hit.
        if out.iter().any(|c| c.url == href) {
            continue;
        }
        let title = squash(&link.text().collect::<Vec<_>>().join(" "));
        let snippet = item
            .select(&sel_snip)
            .next()
            .map(|n| squash(&n.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        out.push(SearchCandidate {
            url: href,
            title,
            snippet,
            source_provider: NAME.to_string(),
        });
    }

    out
}

/// DuckDuckGo's JavaScript-free results page.
pub struct DuckDuckGoHtml {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoHtml {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, ENDPOINT)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoHtml {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, EngineError> {
        let mut url =
            reqwest::Url::parse(&self.endpoint).map_err(|e| EngineError::Fatal(e.to_string()))?;
        url.query_pairs_mut().append_pair("q", query);

        let (_status, body) = fetch_serp_html(&self.client, url, NAME).await?;

        Ok(parse_results(&body, max_results))
    }
}
