//! Browser-like request headers and pacing of outbound search requests.

use crate::core::error::LinkScoutError;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Collection of realistic user agents for rotation
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Get a random user agent string
pub fn get_random_user_agent() -> &'static str {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

/// Browser-like headers for page fetches. `Accept-Encoding` is left to reqwest so the
/// body is decoded transparently.
pub fn get_stealth_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("DNT", "1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Cache-Control", "max-age=0"),
    ]
}

/// Apply a random user agent plus the stealth headers to a request.
pub fn stealth_request(req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    let mut req = req.header("User-Agent", get_random_user_agent());
    for (k, v) in get_stealth_headers() {
        req = req.header(k, v);
    }
    req
}

/// Shared minimum-interval gate for outbound search requests.
///
/// Each caller reserves the next free slot under a short lock and then sleeps outside it,
/// so waiters queue in arrival order without holding the mutex across the sleep.
pub struct RequestGate {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    async fn reserve(&self) -> Instant {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.interval);
        slot
    }

    /// Wait for this caller's slot.
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = self.reserve().await;
        let now = Instant::now();
        if slot > now {
            debug!("request gate: waiting {}ms", (slot - now).as_millis());
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Like [`wait`](Self::wait) but gives up as soon as `cancel` fires.
    pub async fn wait_or_cancel(&self, cancel: &CancellationToken) -> Result<(), LinkScoutError> {
        if cancel.is_cancelled() {
            return Err(LinkScoutError::Aborted);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(LinkScoutError::Aborted),
            _ = self.wait() => Ok(()),
        }
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_user_agents() {
        assert!(!USER_AGENTS.is_empty());
        assert!(USER_AGENTS.contains(&get_random_user_agent()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_spaces_requests() {
        let gate = Arc::new(RequestGate::new(Duration::from_millis(500)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.wait().await;
                Instant::now()
            }));
        }
        let mut times = Vec::new();
        for h in handles {
            times.push(h.await.unwrap() - start);
        }
        times.sort();
        assert!(times[0] < Duration::from_millis(10));
        assert!(times[1] >= Duration::from_millis(500));
        assert!(times[2] >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_wait_is_cancellable() {
        let gate = RequestGate::new(Duration::from_secs(60));
        gate.wait().await;

        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });
        assert_eq!(gate.wait_or_cancel(&token).await, Err(LinkScoutError::Aborted));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let gate = RequestGate::new(Duration::ZERO);
        let start = std::time::Instant::now();
        for _ in 0..5 {
            gate.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
