//! Network fetch collaborator
//!
//! The engine only needs "given a URL, return the response text or a typed
//! error". [`HttpFetcher`] implements that with reqwest; tests and embedders
//! can supply their own [`Fetcher`].

use async_trait::async_trait;

/// Why a fetch failed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} was blocked: {message}")]
    Blocked { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// URL of the failed request
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Blocked { url, .. }
            | FetchError::Transport { url, .. } => url,
        }
    }
}

/// Source of remote dataset content
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the body of `url` as text
    ///
    /// Non-2xx responses, timeouts and transport failures are errors.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use super::{FetchError, Fetcher};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Fetcher backed by a reqwest client
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
    }

    impl HttpFetcher {
        /// Create a fetcher whose requests give up after `timeout`
        pub fn new(timeout: Duration) -> Result<Self, FetchError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("chartbook/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| FetchError::Transport {
                    url: String::new(),
                    message: format!("failed to build HTTP client: {}", e),
                })?;
            Ok(Self { client })
        }
    }

    fn classify(url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_builder() || err.is_redirect() {
            FetchError::Blocked {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    #[async_trait]
    impl Fetcher for HttpFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            tracing::debug!(url, "fetching remote dataset");

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| classify(url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response.text().await.map_err(|e| classify(url, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::Status {
            url: "https://x.org/a.csv".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "https://x.org/a.csv responded with HTTP 404");
        assert_eq!(err.url(), "https://x.org/a.csv");

        let wrapped: crate::ChartbookError = FetchError::Timeout {
            url: "https://x.org".into(),
        }
        .into();
        assert_eq!(
            wrapped.to_string(),
            "Network fetch failed: request to https://x.org timed out"
        );
    }
}
