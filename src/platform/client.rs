//! HTTP clients for script downloads and the remote JS worker

use crate::core::config::ResolverConfig;
use crate::error::ResolveError;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts per download when the failure is retryable
const FETCH_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent
    pub user_agent: Option<String>,
    /// Let reqwest negotiate and decode gzip transparently
    pub gzip: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            gzip: true,
        }
    }
}

impl HttpClientConfig {
    /// Client used for player script and solver helper downloads
    pub fn for_downloads(config: &ResolverConfig) -> Self {
        Self {
            timeout: config.http_timeout,
            user_agent: Some(config.user_agent.clone()),
            gzip: true,
        }
    }

    /// Client used for the remote worker, which handles encodings by hand
    pub fn for_remote_runtime(config: &ResolverConfig) -> Self {
        Self {
            timeout: config.execution_timeout,
            user_agent: Some(config.user_agent.clone()),
            gzip: false,
        }
    }
}

/// Build a reqwest client from `config`
pub fn build_client(config: &HttpClientConfig) -> Result<Client, ResolveError> {
    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .gzip(config.gzip);

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent);
    }

    Ok(builder.build()?)
}

/// GET `url` and return the body, failing on non-success status.
///
/// Timeouts, refused connections and 5xx answers are retried with a doubling delay.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, ResolveError> {
    let mut delay = RETRY_DELAY;
    let mut attempt = 1;

    loop {
        match fetch_once(client, url).await {
            Err(e) if e.is_retryable() && attempt < FETCH_ATTEMPTS => {
                warn!(
                    "Fetching {} failed ({}), retrying in {}",
                    url,
                    e,
                    humantime::format_duration(delay)
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<String, ResolveError> {
    debug!("Fetching {}", url);
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}
