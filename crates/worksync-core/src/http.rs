//! Blocking HTTP facade over the shared async client.
//!
//! Requests run on a small shared tokio runtime via `block_on`, so rayon
//! workers can call them synchronously. Every request races against a
//! [`CancelToken`] so that a shutdown does not wait out a slow server.

use std::sync::LazyLock;
use std::time::Duration;

use crate::error::TransportError;
use crate::shutdown::CancelToken;

/// How often an in-flight request re-checks the cancel flag
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout (connect + headers + body)
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            user_agent: concat!("worksync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Pooled HTTP client with a sync `get_text`
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(8)
            .build()
            .map_err(TransportError::from_reqwest)?;
        Ok(Self { inner })
    }

    /// HTTP GET returning the body as text.
    ///
    /// Non-2xx statuses become [`TransportError::Http`] with the status set.
    pub fn get_text(&self, url: &str, cancel: &CancelToken) -> Result<String, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        SHARED_RUNTIME.handle().block_on(async {
            let request = async {
                let response = self.inner.get(url).send().await?.error_for_status()?;
                response.text().await
            };
            tokio::select! {
                result = request => result.map_err(TransportError::from_reqwest),
                () = wait_cancelled(cancel) => Err(TransportError::Cancelled),
            }
        })
    }
}

async fn wait_cancelled(cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(CANCEL_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("worksync/"));
    }

    #[test]
    fn cancelled_before_request() {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = client
            .get_text("http://127.0.0.1:9/never", &cancel)
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }

    #[test]
    fn invalid_url_fails_without_retry() {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let err = client
            .get_text("not a url at all", &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_)), "{err}");
        assert!(!err.is_transient());
    }
}
