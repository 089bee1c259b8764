use std::time::Duration;
use thiserror::Error;

/// Which layer of the connection failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkCause {
    Dns,
    Connect,
    Tls,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LinkScoutError {
    #[error("malformed url: {0}")]
    MalformedUrl(String),

    #[error("network unreachable ({cause:?}): {detail}")]
    NetworkUnreachable { cause: NetworkCause, detail: String },

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("blocked by policy: {0}")]
    BlockedByPolicy(String),

    #[error("all search providers failed or returned nothing")]
    ProviderExhausted,

    #[error("scrape rejected: {0}")]
    ScrapeRejected(String),

    #[error("candidate rejected: {0}")]
    ValidationRejected(String),

    #[error("a batch is already in progress")]
    AlreadyInProgress,

    #[error("operation aborted")]
    Aborted,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LinkScoutError {
    /// Whether a reachability check may be retried after this failure.
    ///
    /// DNS and TLS failures, malformed input and policy blocks never heal within
    /// the lifetime of a batch.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkScoutError::Timeout(_) | LinkScoutError::RateLimited(_) => true,
            LinkScoutError::NetworkUnreachable { cause, .. } => *cause == NetworkCause::Connect,
            _ => false,
        }
    }

    /// Failures that a local relay might get around.
    pub fn relay_may_help(&self) -> bool {
        matches!(
            self,
            LinkScoutError::BlockedByPolicy(_)
                | LinkScoutError::NetworkUnreachable {
                    cause: NetworkCause::Connect | NetworkCause::Tls,
                    ..
                }
        )
    }

    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return LinkScoutError::Timeout(timeout);
        }
        if err.is_builder() {
            return LinkScoutError::MalformedUrl(err.to_string());
        }
        // The client's redirect policy refused to follow (loop or too many hops).
        if err.is_redirect() {
            return LinkScoutError::BlockedByPolicy(err.to_string());
        }

        let chain = error_chain_text(err);
        let cause = if chain.contains("dns")
            || chain.contains("failed to lookup")
            || chain.contains("name or service not known")
            || chain.contains("no such host")
        {
            NetworkCause::Dns
        } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
            NetworkCause::Tls
        } else {
            NetworkCause::Connect
        };

        LinkScoutError::NetworkUnreachable {
            cause,
            detail: err.to_string(),
        }
    }
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(" | ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_ascii_lowercase()
}
