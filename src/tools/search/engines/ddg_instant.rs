use crate::tools::search::SearchProvider;
use crate::types::SearchCandidate;
use async_trait::async_trait;

use super::{fetch_json, is_absolute_http, squash, EngineError};

pub const NAME: &str = "duckduckgo_instant";
const ENDPOINT: &str = "https://api.duckduckgo.com/";

fn push_topic(out: &mut Vec<SearchCandidate>, topic: &serde_json::Value) {
    let (Some(text), Some(url)) = (
        topic.get("Text").and_then(|v| v.as_str()),
        topic.get("FirstURL").and_then(|v| v.as_str()),
    ) else {
        return;
    };
    if !is_absolute_http(url) || out.iter().any(|c| c.url == url) {
        return;
    }
    let text = squash(text);
    // Topic text reads "Title - description".
    let title = text
        .split(" - ")
        .next()
        .unwrap_or(&text)
        .chars()
        .take(100)
        .collect();
    out.push(SearchCandidate {
        url: url.to_string(),
        title,
        snippet: text,
        source_provider: NAME.to_string(),
    });
}

/// Results from an instant-answer payload: the abstract, direct results, then related topics
/// (one level of topic groups is flattened).
pub fn parse_response(json: &serde_json::Value, max_results: usize) -> Vec<SearchCandidate> {
    let mut out = Vec::new();

    let abstract_url = json.get("AbstractURL").and_then(|v| v.as_str()).unwrap_or("");
    let abstract_text = json.get("AbstractText").and_then(|v| v.as_str()).unwrap_or("");
    if is_absolute_http(abstract_url) && !abstract_text.trim().is_empty() {
        out.push(SearchCandidate {
            url: abstract_url.to_string(),
            title: json
                .get("Heading")
                .and_then(|v| v.as_str())
                .map(squash)
                .unwrap_or_default(),
            snippet: squash(abstract_text),
            source_provider: NAME.to_string(),
        });
    }

    for key in ["Results", "RelatedTopics"] {
        let Some(topics) = json.get(key).and_then(|v| v.as_array()) else {
            continue;
        };
        for topic in topics {
            if let Some(group) = topic.get("Topics").and_then(|v| v.as_array()) {
                for inner in group {
                    push_topic(&mut out, inner);
                }
            } else {
                push_topic(&mut out, topic);
            }
        }
    }

    out.truncate(max_results);
    out
}

/// DuckDuckGo instant-answer API. Needs no key; often empty for long-tail queries.
pub struct DuckDuckGoInstant {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoInstant {
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
impl SearchProvider for DuckDuckGoInstant {
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
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("no_html", "1")
            .append_pair("skip_disambig", "1");

        let req = self
            .client
            .get(url)
            .header("User-Agent", crate::antibot::get_random_user_agent());
        let json = fetch_json(req, NAME).await?;
        Ok(parse_response(&json, max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_abstract_and_topics() {
        let json = serde_json::json!({
            "Heading": "Rust",
            "AbstractText": "A systems language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust",
            "Results": [],
            "RelatedTopics": [
                {"Text": "Cargo - the package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Group", "Topics": [
                    {"Text": "Crates.io - registry", "FirstURL": "https://duckduckgo.com/Crates"}
                ]},
                {"Text": "no url"}
            ]
        });
        let results = parse_response(&json, 10);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Rust");
        assert_eq!(results[1].title, "Cargo");
        assert_eq!(results[2].url, "https://duckduckgo.com/Crates");
    }

    #[test]
    fn test_empty_payload() {
        let json = serde_json::json!({"AbstractText": "", "RelatedTopics": []});
        assert!(parse_response(&json, 5).is_empty());
    }
}
