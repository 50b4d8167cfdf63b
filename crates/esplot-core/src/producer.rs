//! Producer-side client for submitting plots to a running broker.
//!
//! Plotting processes use this to push a rendering to `/new`. The broker may
//! still be starting up, so [`PlotClient::submit_with_retry`] keeps trying
//! while the connection is refused.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EsplotError, EsplotResult};
use crate::hub::HubStats;

/// Default broker URL.
pub const DEFAULT_BROKER_URL: &str = "http://127.0.0.1:46852";

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_MAX_ATTEMPTS: u32 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Submits plots to the broker over HTTP.
#[derive(Clone, Debug)]
pub struct PlotClient {
    client: reqwest::Client,
    base_url: String,
    retry_interval: Duration,
    max_attempts: u32,
}

impl PlotClient {
    /// Create a client with default settings.
    ///
    /// Uses the `ESPLOT_URL` environment variable if set,
    /// otherwise defaults to `http://127.0.0.1:46852`.
    pub fn new() -> Self {
        let base_url =
            std::env::var("ESPLOT_URL").unwrap_or_else(|_| DEFAULT_BROKER_URL.to_string());
        Self::with_url(&base_url)
    }

    /// Create a client with a custom base URL.
    pub fn with_url(base_url: &str) -> Self {
        debug!(base_url = %base_url, "PlotClient initialized");
        Self {
            client: http_client(REQUEST_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Per-request timeout. A timed-out submission is not retried.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a broker answers at the base URL.
    pub async fn is_running(&self) -> bool {
        match self.client.get(format!("{}/", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, url = %self.base_url, "Broker not reachable");
                false
            }
        }
    }

    /// Submit one payload. Succeeds only on `200 OK`.
    pub async fn submit(&self, body: Bytes, content_type: &str) -> EsplotResult<()> {
        let url = format!("{}/new", self.base_url);
        debug!(url = %url, bytes = body.len(), "Submitting plot");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let reason = response.text().await.unwrap_or_default();
        warn!(status_code = %status, reason = %reason, "Broker rejected submission");
        Err(EsplotError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }

    /// Submit, retrying while the broker cannot be reached.
    ///
    /// Only failures to connect are retried. A rejection or a timeout is
    /// returned immediately, since a timed-out request may already have been
    /// broadcast. Returns the number of attempts used.
    pub async fn submit_with_retry(&self, body: Bytes, content_type: &str) -> EsplotResult<u32> {
        for attempt in 1..=self.max_attempts {
            match self.submit(body.clone(), content_type).await {
                Ok(()) => {
                    info!(attempt, "Plot submitted");
                    return Ok(attempt);
                }
                Err(EsplotError::Http(e)) if e.is_connect() => {
                    info!(attempt, "ESPlot not running, waiting for it to start...");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_interval).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(EsplotError::Unreachable {
            attempts: self.max_attempts,
        })
    }

    /// Fetch the hub counters from `/status`.
    pub async fn stats(&self) -> EsplotResult<HubStats> {
        let stats = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<HubStats>()
            .await?;
        Ok(stats)
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

impl Default for PlotClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn refused_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = PlotClient::with_url("http://localhost:46852/");
        assert_eq!(client.base_url(), "http://localhost:46852");
    }

    #[tokio::test]
    async fn test_not_running() {
        let client = PlotClient::with_url(&refused_url().await);
        assert!(!client.is_running().await);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let client = PlotClient::with_url(&refused_url().await)
            .retry_interval(Duration::from_millis(10))
            .max_attempts(3);

        let err = client
            .submit_with_retry(Bytes::from_static(b"<p>plot</p>"), "text/html")
            .await
            .unwrap_err();
        assert!(matches!(err, EsplotError::Unreachable { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_timed_out_submission_not_retried() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });

        let client = PlotClient::with_url(&format!("http://{}", addr))
            .request_timeout(Duration::from_millis(100))
            .retry_interval(Duration::from_millis(10))
            .max_attempts(3);

        let err = client
            .submit_with_retry(Bytes::from_static(b"<p>plot</p>"), "text/html")
            .await
            .unwrap_err();
        assert!(matches!(err, EsplotError::Http(ref e) if e.is_timeout()));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
