use super::relay::RelayClient;
use crate::antibot;
use crate::core::collaborators::{CheckOptions, UrlValidator};
use crate::core::error::LinkScoutError;
use crate::types::UrlCheck;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::future::retry;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Response headers worth keeping on a check result.
const KEPT_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "last-modified",
    "location",
    "server",
    "retry-after",
];

/// Where a request ended up, when that differs from the requested URL once both are in
/// canonical form (host case, default port and an empty path are not redirects).
fn landed_elsewhere(requested: &str, landed: &url::Url) -> Option<String> {
    match url::Url::parse(requested) {
        Ok(req) if req == *landed => None,
        _ => Some(landed.to_string()),
    }
}

/// `step`, `2×step`, `3×step`, ... for at most `max_retries` retries.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    step: Duration,
    max_retries: u32,
    attempt: u32,
}

impl LinearBackoff {
    pub fn new(step: Duration, max_retries: u32) -> Self {
        Self {
            step,
            max_retries,
            attempt: 0,
        }
    }
}

impl Backoff for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }
        self.attempt += 1;
        Some(self.step * self.attempt)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Default link checker: HEAD, falling back to GET for servers that refuse HEAD, retried with
/// linear backoff, with an optional relay for requests the network refuses outright.
///
/// Result caching is the orchestrator's job; `CheckOptions::use_cache` is not consulted here.
pub struct HttpUrlValidator {
    client: reqwest::Client,
    max_retries: u32,
    retry_step: Duration,
    relay: Option<RelayClient>,
}

impl HttpUrlValidator {
    pub fn new(client: reqwest::Client, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
            retry_step: Duration::from_millis(500),
            relay: None,
        }
    }

    pub fn with_relay(mut self, relay: RelayClient) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_retry_step(mut self, step: Duration) -> Self {
        self.retry_step = step;
        self
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<UrlCheck, LinkScoutError> {
        let started = Instant::now();
        let req = antibot::stealth_request(self.client.request(method, url)).timeout(timeout);
        let resp = req
            .send()
            .await
            .map_err(|e| LinkScoutError::from_reqwest(&e, timeout))?;

        let status = resp.status();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter(|(k, _)| KEPT_HEADERS.contains(&k.as_str()))
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let final_url = landed_elsewhere(url, resp.url());

        Ok(UrlCheck {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            response_time_ms: started.elapsed().as_millis() as u64,
            headers,
            timestamp: Utc::now(),
            final_url,
        })
    }

    /// One attempt: HEAD, then GET when HEAD is refused or unreliable.
    async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<UrlCheck, LinkScoutError> {
        let head = self.request(Method::HEAD, url, timeout).await?;
        let head_refused = matches!(
            StatusCode::from_u16(head.status).ok(),
            Some(StatusCode::METHOD_NOT_ALLOWED)
                | Some(StatusCode::NOT_IMPLEMENTED)
                | Some(StatusCode::FORBIDDEN)
                | Some(StatusCode::NOT_FOUND)
        );
        if !head_refused {
            return Ok(head);
        }
        debug!("HEAD {} answered {}, retrying with GET", url, head.status);
        self.request(Method::GET, url, timeout).await
    }

    async fn fetch_with_retries(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<UrlCheck, LinkScoutError> {
        retry(LinearBackoff::new(self.retry_step, self.max_retries), || async {
            match self.fetch_once(url, timeout).await {
                Ok(check) if check.status == 429 => Err(backoff::Error::transient(
                    LinkScoutError::RateLimited(format!("{} answered 429", url)),
                )),
                Ok(check) => Ok(check),
                Err(e) if e.is_retryable() => {
                    debug!("transient failure checking {}: {}", url, e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }
}

#[async_trait]
impl UrlValidator for HttpUrlValidator {
    async fn validate_url(&self, url: &str, opts: CheckOptions) -> Result<UrlCheck, LinkScoutError> {
        let parsed =
            url::Url::parse(url).map_err(|e| LinkScoutError::MalformedUrl(format!("{}: {}", url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(LinkScoutError::MalformedUrl(format!(
                "{}: unsupported scheme '{}'",
                url,
                parsed.scheme()
            )));
        }

        match self.fetch_with_retries(url, opts.timeout).await {
            Ok(check) => Ok(check),
            Err(LinkScoutError::RateLimited(_)) => {
                // Retries exhausted on 429; report the status itself.
                self.request(Method::GET, url, opts.timeout).await
            }
            Err(e) => {
                let Some(relay) = self.relay.as_ref().filter(|_| e.relay_may_help()) else {
                    return Err(e);
                };
                warn!("direct check of {} failed ({}), asking relay", url, e);
                match relay.check(url, "HEAD", opts.timeout).await {
                    Ok(check) => {
                        info!("relay checked {}: {}", url, check.status);
                        Ok(check)
                    }
                    Err(relay_err) => {
                        debug!("relay failed for {}: {}", url, relay_err);
                        Err(e)
                    }
                }
            }
        }
    }
}
