//! Disposable Python environment for the simulator's asset scripts.
//!
//! The texture generation scripts under `script/` need a Python interpreter
//! with `numpy` and `pillow`. This crate rebuilds that environment from
//! scratch on every run:
//!
//! - A progress reporting trait for environment lifecycle events
//! - Backends for `uv` and the standard library `venv` module
//! - [`rebuild_environment`], which removes, recreates and populates the env
//!
//! There is no process-wide activation. Operations return a
//! [`SimEnvironment`] handle and later steps run against its interpreter.
//!
//! ```ignore
//! use sim_env::{detect_backend, rebuild_environment, EnvSpec, LogHandler};
//!
//! let spec = EnvSpec::default();
//! let backend = detect_backend().await?;
//! let env = rebuild_environment(&spec.path, &spec.packages, &backend, &LogHandler).await?;
//! ```

pub mod backend;
pub mod error;
pub mod progress;
pub mod venv;

// Re-export key types
pub use backend::{detect_backend, Backend, EnvBackend, UvBackend, VenvBackend};
pub use error::{BootstrapError, Result};
pub use progress::{EnvProgressPhase, LogHandler, ProgressHandler};
pub use venv::{
    install_packages, rebuild_environment, remove_environment, EnvSpec, InstallPolicy,
    InstallReport, PackageOutcome, SimEnvironment,
};
