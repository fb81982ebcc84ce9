//! Error types for kernel provisioning.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),
}

impl ProvisionError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the remote side (unreachable host, timeout, bad status).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ProvisionError::Network { .. } | ProvisionError::Status { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
