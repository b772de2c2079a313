// src/fetch/client.rs

//! HTTP access to remote mirrors

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single mirror request (15 seconds)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings for the mirror HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Upper bound for one request, connect through body
    pub timeout: Duration,
    /// Ignore proxy settings from the environment
    pub no_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: HTTP_TIMEOUT,
            no_proxy: false,
        }
    }
}

/// Blocking HTTP client wrapper used for remote mirrors
///
/// One request per mirror, no retries: fallback to the next mirror is the
/// retry strategy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new client with the given settings
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        if config.no_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| Error::Unsupported(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET `url` and stream a 200 response body into `out`
    ///
    /// Any other status or a transport failure is a `DownloadError`.
    pub fn download(&self, url: &str, out: &mut impl Write) -> Result<u64> {
        debug!("GET {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("{}: {}", url, e)))?;

        if response.status() != StatusCode::OK {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let written = response
            .copy_to(out)
            .map_err(|e| Error::DownloadError(format!("Failed to read body of {}: {}", url, e)))?;

        debug!("Received {} bytes from {}", written, url);
        Ok(written)
    }
}
