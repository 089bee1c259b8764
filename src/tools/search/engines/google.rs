use crate::tools::search::SearchProvider;
use crate::types::SearchCandidate;
use async_trait::async_trait;

use super::{fetch_json, is_absolute_http, squash, EngineError};

pub const NAME: &str = "google";
const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
/// The Custom Search API refuses `num` above 10.
const MAX_PAGE: usize = 10;

pub(crate) fn normalize_google_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let wrapped = href.starts_with("/url?")
        || href.starts_with("https://www.google.com/url?")
        || href.starts_with("http://www.google.com/url?");
    if wrapped {
        let absolute = if href.starts_with('/') {
            format!("https://www.google.com{}", href)
        } else {
            href.to_string()
        };
        let url = reqwest::Url::parse(&absolute).ok()?;
        return url
            .query_pairs()
            .find(|(k, v)| (k == "q" || k == "url") && is_absolute_http(v))
            .map(|(_, v)| v.to_string());
    }

    is_absolute_http(href).then(|| href.to_string())
}

pub fn parse_api_results(json: &serde_json::Value, max_results: usize) -> Vec<SearchCandidate> {
    let Some(items) = json.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let link = item.get("link").and_then(|v| v.as_str())?;
            let url = normalize_google_href(link)?;
            Some(SearchCandidate {
                url,
                title: item
                    .get("title")
                    .and_then(|v| v.as_str())
                    .map(squash)
                    .unwrap_or_default(),
                snippet: item
                    .get("snippet")
                    .and_then(|v| v.as_str())
                    .map(squash)
                    .unwrap_or_default(),
                source_provider: NAME.to_string(),
            })
        })
        .take(max_results)
        .collect()
}

/// Google Programmable Search (Custom Search JSON API). Needs both a key and an engine id.
pub struct GoogleCse {
    client: reqwest::Client,
    api_key: Option<String>,
    cx: Option<String>,
    endpoint: String,
}

impl GoogleCse {
    pub fn new(client: reqwest::Client, api_key: Option<String>, cx: Option<String>) -> Self {
        Self::with_endpoint(client, api_key, cx, ENDPOINT)
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        api_key: Option<String>,
        cx: Option<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            cx,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleCse {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.cx.is_some()
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, EngineError> {
        let (Some(key), Some(cx)) = (self.api_key.as_deref(), self.cx.as_deref()) else {
            return Err(EngineError::NotConfigured);
        };

        let mut url =
            reqwest::Url::parse(&self.endpoint).map_err(|e| EngineError::Fatal(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", key)
            .append_pair("cx", cx)
            .append_pair("q", query)
            .append_pair("num", &max_results.clamp(1, MAX_PAGE).to_string());

        let json = fetch_json(self.client.get(url), NAME).await?;
        if let Some(err) = json.get("error") {
            let msg = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(EngineError::Fatal(format!("google cse: {}", msg)));
        }

        Ok(parse_api_results(&json, max_results))
    }
}
