//! Transports that move a remote kernel onto local disk.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use log::debug;
use tokio::io::AsyncWriteExt;

use crate::error::{ProvisionError, Result};

/// Fetches a single URL into a file.
///
/// Implementations create (or truncate) `dest` and write the full response
/// body to it, returning the number of bytes written. Any non-success
/// response must be an error; no retries.
pub trait Transport {
    fn download(&self, url: &str, dest: &Path) -> impl Future<Output = Result<u64>> + Send;
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Longest silence tolerated between reads of the body.
    pub read_timeout: Duration,
    /// Maximum number of redirects followed per request.
    pub max_redirects: usize,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(300),
            max_redirects: 10,
            user_agent: concat!("kernel-fetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// reqwest-backed transport. Follows redirects and streams bodies to disk.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .build()
            .map_err(ProvisionError::Client)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let network = |source| ProvisionError::Network {
            url: url.to_string(),
            source,
        };

        let mut response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if response.url().as_str() != url {
            debug!("{url} redirected to {}", response.url());
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ProvisionError::fs(dest, e))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(network)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ProvisionError::fs(dest, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| ProvisionError::fs(dest, e))?;
        file.sync_all()
            .await
            .map_err(|e| ProvisionError::fs(dest, e))?;

        Ok(written)
    }
}
