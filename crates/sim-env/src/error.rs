//! Error types for environment bootstrapping.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create virtual environment at {}: {stderr}", path.display())]
    CreateFailed { path: PathBuf, stderr: String },

    #[error("Failed to install {package}: {stderr}")]
    PackageInstall { package: String, stderr: String },

    #[error("No environment tool available: {0}")]
    ToolNotFound(String),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
