use crate::tools::search::SearchProvider;
use crate::types::SearchCandidate;
use async_trait::async_trait;
use base64::Engine as _;
use scraper::{Html, Selector};

use super::{fetch_serp_html, is_absolute_http, squash, EngineError};

pub const NAME: &str = "bing";
const ENDPOINT: &str = "https://www.bing.com/search";

fn decode_ck_target(raw: &str) -> Option<String> {
    // Observed format: u=a1<base64url(url)>, padding stripped.
    let payload = raw.strip_prefix("a1").unwrap_or(raw);
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(payload))
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let decoded = decoded.trim();
    is_absolute_http(decoded).then(|| decoded.to_string())
}

fn normalize_bing_href(href: &str) -> Option<String> {
    let href = href.trim();
    if !is_absolute_http(href) {
        return None;
    }

    let Ok(url) = url::Url::parse(href) else {
        return Some(href.to_string());
    };

    if matches!(url.host_str(), Some("www.bing.com") | Some("bing.com"))
        && url.path().starts_with("/ck/")
    {
        // Fall back to the tracking link itself when decoding fails.
        return url
            .query_pairs()
            .find(|(k, v)| k == "u" && !v.trim().is_empty())
            .and_then(|(_, v)| decode_ck_target(&v))
            .or_else(|| Some(href.to_string()));
    }

    Some(href.to_string())
}

pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchCandidate> {
    let doc = Html::parse_document(html);
    let sel_item = Selector::parse("li.b_algo").unwrap();
    let sel_link = Selector::parse("h2 a").unwrap();
    let sel_snip = Selector::parse("div.b_caption p, p.b_lineclamp2, p.b_lineclamp3").unwrap();

    let mut out = Vec::new();
    for item in doc.select(&sel_item) {
        if out.len() >= max_results {
            break;
        }
        let Some(link) = item.select(&sel_link).next() else {
            continue;
        };
        let Some(href) = normalize_bing_href(link.value().attr("href").unwrap_or("")) else {
            continue;
        };
        let title = squash(&link.text().collect::<Vec<_>>().join(" "));
        let snippet = item
            .select(&sel_snip)
            .next()
            .map(|p| squash(&p.text().collect::<Vec<_>>().join(" ")))
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

pub struct BingHtml {
    client: reqwest::Client,
    endpoint: String,
}

impl BingHtml {
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
impl SearchProvider for BingHtml {
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
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("q", query);
            qp.append_pair("count", &max_results.clamp(1, 50).to_string());
        }

        let (_status, body) = fetch_serp_html(&self.client, url, NAME).await?;

        Ok(parse_results(&body, max_results))
    }
}
