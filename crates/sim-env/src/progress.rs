//! Progress reporting for environment operations.
//!
//! Provides [`EnvProgressPhase`] events covering a rebuild (removal,
//! creation, per-package installs) and a [`ProgressHandler`] trait that
//! consumers implement to route events to their output.

use serde::{Deserialize, Serialize};

/// Progress phases during an environment rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum EnvProgressPhase {
    /// Starting a rebuild.
    Starting {
        env_path: String,
        packages: Vec<String>,
    },
    /// Deleting the previous environment.
    Removing { env_path: String },
    /// Creating the virtual environment.
    CreatingVenv,
    /// Installing one package.
    InstallingPackage {
        package: String,
        /// 1-based position in the install list.
        index: usize,
        total: usize,
    },
    /// One package finished installing.
    PackageInstalled { package: String, elapsed_ms: u64 },
    /// All installs finished.
    InstallComplete { elapsed_ms: u64 },
    /// Environment is ready.
    Ready {
        env_path: String,
        python_path: String,
    },
    /// An error occurred.
    Error { message: String },
}

/// Trait for receiving environment progress events.
pub trait ProgressHandler: Send + Sync {
    /// Called for each progress phase.
    ///
    /// `env_type` is the backend name, `"uv"` or `"venv"`.
    fn on_progress(&self, env_type: &str, phase: EnvProgressPhase);
}

/// Log-only progress handler.
///
/// Writes progress phases to the `log` crate at info level.
pub struct LogHandler;

impl ProgressHandler for LogHandler {
    fn on_progress(&self, env_type: &str, phase: EnvProgressPhase) {
        match &phase {
            EnvProgressPhase::Starting { env_path, packages } => {
                log::info!("[{env_type}] Rebuilding {env_path} with {packages:?}");
            }
            EnvProgressPhase::Removing { env_path } => {
                log::info!("[{env_type}] Removing existing environment at {env_path}");
            }
            EnvProgressPhase::CreatingVenv => {
                log::info!("[{env_type}] Creating virtual environment...");
            }
            EnvProgressPhase::InstallingPackage {
                package,
                index,
                total,
            } => {
                log::info!("[{env_type}] Installing {package} ({index}/{total})");
            }
            EnvProgressPhase::PackageInstalled {
                package,
                elapsed_ms,
            } => {
                log::debug!("[{env_type}] {package} installed in {elapsed_ms}ms");
            }
            EnvProgressPhase::InstallComplete { elapsed_ms } => {
                log::info!("[{env_type}] Installation complete in {elapsed_ms}ms");
            }
            EnvProgressPhase::Ready {
                env_path,
                python_path,
            } => {
                log::info!("[{env_type}] Ready: env={env_path} python={python_path}");
            }
            EnvProgressPhase::Error { message } => {
                log::error!("[{env_type}] Error: {message}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serde_tag() {
        let phase = EnvProgressPhase::InstallingPackage {
            package: "numpy".into(),
            index: 1,
            total: 2,
        };
        let json = serde_json::to_value(&phase).unwrap();
        assert_eq!(json["phase"], "installing_package");
        assert_eq!(json["package"], "numpy");

        let back: EnvProgressPhase = serde_json::from_value(json).unwrap();
        assert_eq!(back, phase);
    }

    #[test]
    fn test_unit_phase_serde() {
        let json = serde_json::to_string(&EnvProgressPhase::CreatingVenv).unwrap();
        assert_eq!(json, r#"{"phase":"creating_venv"}"#);
    }
}
