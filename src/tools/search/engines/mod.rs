pub mod bing;
pub mod brave;
pub mod ddg_instant;
pub mod duckduckgo;
pub mod google;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The engine served a captcha, consent or block page instead of results.
    #[error("blocked: {reason}")]
    Blocked { reason: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("transient: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("not configured")]
    NotConfigured,
}

impl EngineError {
    /// The engine is pushing back on us rather than failing on its own.
    pub fn is_throttle(&self) -> bool {
        matches!(self, EngineError::Blocked { .. } | EngineError::RateLimited(_))
    }

    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            EngineError::Transient(err.to_string())
        } else if err.is_builder() {
            EngineError::Fatal(err.to_string())
        } else {
            EngineError::Transient(err.to_string())
        }
    }
}

pub fn detect_block_reason(status: StatusCode, body: &str) -> Option<String> {
    if status == StatusCode::FORBIDDEN {
        return Some("http_403".to_string());
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Some("http_503".to_string());
    }

    let lower = body.to_lowercase();
    let maybe = [
        (
            "our systems have detected unusual traffic",
            "unusual_traffic",
        ),
        ("unusual traffic", "unusual_traffic"),
        (
            "sorry, but your computer or network may be sending automated queries",
            "captcha",
        ),
        ("anomaly-modal", "captcha"),
        ("recaptcha", "captcha"),
        ("hcaptcha", "captcha"),
        ("verify you are human", "captcha"),
        ("captcha", "captcha"),
    ];

    for (needle, label) in maybe {
        if lower.contains(needle) {
            return Some(label.to_string());
        }
    }

    // Tiny page mentioning a block.
    if body.len() < 3500 && lower.contains("blocked") {
        return Some("block_page".to_string());
    }

    None
}

/// Fetch a results page, turning throttling and block pages into typed errors.
pub async fn fetch_serp_html(
    client: &reqwest::Client,
    url: reqwest::Url,
    engine: &str,
) -> Result<(StatusCode, String), EngineError> {
    let req = crate::antibot::stealth_request(client.get(url));
    let resp = req.send().await.map_err(EngineError::from_send)?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(EngineError::RateLimited(format!("{} http_429", engine)));
    }
    let body = resp.text().await.unwrap_or_default();

    if let Some(reason) = detect_block_reason(status, &body) {
        tracing::warn!("{} served a block page: {}", engine, reason);
        return Err(EngineError::Blocked { reason });
    }
    if status.is_server_error() {
        return Err(EngineError::Transient(format!("{} http_{}", engine, status.as_u16())));
    }
    if !status.is_success() {
        return Err(EngineError::Fatal(format!("{} http_{}", engine, status.as_u16())));
    }
    Ok((status, body))
}

/// Send a JSON API request and classify the HTTP outcome.
pub async fn fetch_json(
    req: reqwest::RequestBuilder,
    engine: &str,
) -> Result<serde_json::Value, EngineError> {
    let resp = req.send().await.map_err(EngineError::from_send)?;
    let status = resp.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            return Err(EngineError::RateLimited(format!("{} http_429", engine)))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(EngineError::Fatal(format!(
                "{} rejected the credentials (http_{})",
                engine,
                status.as_u16()
            )))
        }
        s if s.is_server_error() => {
            return Err(EngineError::Transient(format!("{} http_{}", engine, s.as_u16())))
        }
        s if !s.is_success() => {
            return Err(EngineError::Fatal(format!("{} http_{}", engine, s.as_u16())))
        }
        _ => {}
    }
    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| EngineError::Transient(format!("{} returned invalid json: {}", engine, e)))
}

/// Collapse runs of whitespace in scraped text.
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn is_absolute_http(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}
