// src/services/source.rs

//! Search page source.
//!
//! Fetches the raw search results page. Every transport problem comes back as
//! an `Err`; callers treat it as "no data this cycle".

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{RawPage, SourceConfig};
use crate::utils::http::create_async_client;

/// A source of raw search result pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page at `url`.
    async fn fetch(&self, url: &str) -> Result<RawPage>;
}

/// HTTP page source with a bounded timeout and a browser-like user agent.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Create a new source with the given configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<RawPage> {
        log::debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        log::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(RawPage {
            url: url.to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    #[test]
    fn test_build_from_default_config() {
        let config = Config::default();
        assert!(HttpSource::new(&config.source).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let mut config = Config::default();
        config.source.timeout_secs = 1;
        let source = HttpSource::new(&config.source).unwrap();

        // Port 9 on localhost is the discard port and is virtually never open.
        let err = source.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_transport());
    }
}
