//! Client for the optional local relay that checks URLs on our behalf when direct requests are
//! refused (CORS-style policy blocks, hostile firewalls).

use crate::core::error::LinkScoutError;
use crate::types::UrlCheck;
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayReply {
    status: u16,
    #[serde(default)]
    status_text: String,
    #[serde(default)]
    response_time: Option<u64>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    final_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base: url::Url,
}

impl RelayClient {
    pub fn new(client: reqwest::Client, base: &str) -> Result<Self, LinkScoutError> {
        let base = url::Url::parse(base)
            .map_err(|e| LinkScoutError::Config(format!("relay url '{}': {}", base, e)))?;
        Ok(Self { client, base })
    }

    /// `GET {relay}/validate-url?url=..&method=..&timeout=..`
    pub async fn check(
        &self,
        target: &str,
        method: &str,
        timeout: Duration,
    ) -> Result<UrlCheck, LinkScoutError> {
        let mut endpoint = self
            .base
            .join("validate-url")
            .map_err(|e| LinkScoutError::Config(format!("relay url: {}", e)))?;
        endpoint
            .query_pairs_mut()
            .append_pair("url", target)
            .append_pair("method", method)
            .append_pair("timeout", &timeout.as_millis().to_string());

        let started = std::time::Instant::now();
        // Give the relay its own budget on top of the upstream timeout.
        let budget = timeout + Duration::from_secs(2);
        let resp = self
            .client
            .get(endpoint)
            .timeout(budget)
            .send()
            .await
            .map_err(|e| LinkScoutError::from_reqwest(&e, budget))?;

        if !resp.status().is_success() {
            return Err(LinkScoutError::NetworkUnreachable {
                cause: crate::core::error::NetworkCause::Connect,
                detail: format!("relay answered http {}", resp.status().as_u16()),
            });
        }

        let reply: RelayReply = resp
            .json()
            .await
            .map_err(|e| LinkScoutError::from_reqwest(&e, budget))?;
        if reply.status == 0 {
            return Err(LinkScoutError::NetworkUnreachable {
                cause: crate::core::error::NetworkCause::Connect,
                detail: reply
                    .error
                    .unwrap_or_else(|| "relay could not reach the target".to_string()),
            });
        }

        Ok(UrlCheck {
            status: reply.status,
            status_text: reply.status_text,
            response_time_ms: reply
                .response_time
                .unwrap_or_else(|| started.elapsed().as_millis() as u64),
            headers: reply.headers,
            timestamp: Utc::now(),
            final_url: reply.final_url,
        })
    }
}
