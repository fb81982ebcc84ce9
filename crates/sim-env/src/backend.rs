//! Tools that create environments and install packages into them.
//!
//! `uv` is preferred when it is on PATH. Otherwise the standard library
//! `venv` module of a system Python is used, with `pip` for installs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use log::info;

use crate::error::{BootstrapError, Result};
use crate::venv::SimEnvironment;

/// Creates environments and installs packages into them.
///
/// Implementations run one external command per call and never retry.
pub trait EnvBackend {
    /// Short name used as the progress `env_type`.
    fn name(&self) -> &'static str;

    /// Create a fresh environment at `env_path`, which does not exist.
    fn create(&self, env_path: &Path) -> impl Future<Output = Result<SimEnvironment>> + Send;

    /// Install a single package into `env`.
    fn install(
        &self,
        env: &SimEnvironment,
        package: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// `uv venv` + `uv pip install`.
#[derive(Debug, Clone)]
pub struct UvBackend {
    pub uv_path: PathBuf,
}

/// `python -m venv` + `python -m pip install`.
#[derive(Debug, Clone)]
pub struct VenvBackend {
    /// Interpreter used to create the environment.
    pub python: PathBuf,
}

async fn run(mut cmd: tokio::process::Command, program: &Path) -> Result<Output> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| BootstrapError::Spawn {
            program: program.display().to_string(),
            source,
        })
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

impl EnvBackend for UvBackend {
    fn name(&self) -> &'static str {
        "uv"
    }

    async fn create(&self, env_path: &Path) -> Result<SimEnvironment> {
        let mut cmd = tokio::process::Command::new(&self.uv_path);
        cmd.arg("venv").arg(env_path);

        let output = run(cmd, &self.uv_path).await?;
        if !output.status.success() {
            return Err(BootstrapError::CreateFailed {
                path: env_path.to_path_buf(),
                stderr: stderr_of(&output),
            });
        }

        Ok(SimEnvironment::at(env_path))
    }

    async fn install(&self, env: &SimEnvironment, package: &str) -> Result<()> {
        let mut cmd = tokio::process::Command::new(&self.uv_path);
        cmd.args(["pip", "install", "--python"])
            .arg(&env.python_path)
            .arg(package);

        let output = run(cmd, &self.uv_path).await?;
        if !output.status.success() {
            return Err(BootstrapError::PackageInstall {
                package: package.to_string(),
                stderr: stderr_of(&output),
            });
        }
        Ok(())
    }
}

impl EnvBackend for VenvBackend {
    fn name(&self) -> &'static str {
        "venv"
    }

    async fn create(&self, env_path: &Path) -> Result<SimEnvironment> {
        let mut cmd = tokio::process::Command::new(&self.python);
        cmd.args(["-m", "venv"]).arg(env_path);

        let output = run(cmd, &self.python).await?;
        if !output.status.success() {
            return Err(BootstrapError::CreateFailed {
                path: env_path.to_path_buf(),
                stderr: stderr_of(&output),
            });
        }

        Ok(SimEnvironment::at(env_path))
    }

    async fn install(&self, env: &SimEnvironment, package: &str) -> Result<()> {
        let mut cmd = env.python_command();
        cmd.args(["-m", "pip", "install", "--disable-pip-version-check"])
            .arg(package);

        let output = run(cmd, &env.python_path).await?;
        if !output.status.success() {
            return Err(BootstrapError::PackageInstall {
                package: package.to_string(),
                stderr: stderr_of(&output),
            });
        }
        Ok(())
    }
}

/// The backend chosen by [`detect_backend`].
#[derive(Debug, Clone)]
pub enum Backend {
    Uv(UvBackend),
    Venv(VenvBackend),
}

impl EnvBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Uv(b) => b.name(),
            Backend::Venv(b) => b.name(),
        }
    }

    async fn create(&self, env_path: &Path) -> Result<SimEnvironment> {
        match self {
            Backend::Uv(b) => b.create(env_path).await,
            Backend::Venv(b) => b.create(env_path).await,
        }
    }

    async fn install(&self, env: &SimEnvironment, package: &str) -> Result<()> {
        match self {
            Backend::Uv(b) => b.install(env, package).await,
            Backend::Venv(b) => b.install(env, package).await,
        }
    }
}

/// Whether `program --version` runs and exits successfully.
async fn responds_to_version(program: &str) -> bool {
    match tokio::process::Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

/// Pick a backend from what is on PATH.
///
/// 1. `uv`, if `uv --version` succeeds
/// 2. `python3`, then `python`, with the `venv` module
pub async fn detect_backend() -> Result<Backend> {
    if responds_to_version("uv").await {
        info!("Using system uv");
        return Ok(Backend::Uv(UvBackend {
            uv_path: PathBuf::from("uv"),
        }));
    }

    for python in ["python3", "python"] {
        if responds_to_version(python).await {
            info!("uv not found on PATH, using {python} -m venv");
            return Ok(Backend::Venv(VenvBackend {
                python: PathBuf::from(python),
            }));
        }
    }

    Err(BootstrapError::ToolNotFound(
        "neither uv nor a Python interpreter was found on PATH".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        let uv = Backend::Uv(UvBackend {
            uv_path: PathBuf::from("uv"),
        });
        let venv = Backend::Venv(VenvBackend {
            python: PathBuf::from("python3"),
        });
        assert_eq!(uv.name(), "uv");
        assert_eq!(venv.name(), "venv");
    }

    #[tokio::test]
    async fn test_missing_program_does_not_respond() {
        assert!(!responds_to_version("definitely-not-a-real-tool-4f1c").await);
    }

    #[tokio::test]
    async fn test_create_with_missing_tool_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = UvBackend {
            uv_path: PathBuf::from("definitely-not-a-real-tool-4f1c"),
        };
        let err = backend.create(&dir.path().join(".venv")).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Spawn { .. }));
    }
}
