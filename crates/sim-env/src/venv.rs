//! Rebuilding the project's virtual environment.
//!
//! A rebuild is destructive by intent: whatever is at the environment path
//! is deleted, a new environment is created, and the package list is
//! installed in order.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;
use serde::{Deserialize, Deserializer, Serialize};

use crate::backend::EnvBackend;
use crate::error::{BootstrapError, Result};
use crate::progress::{EnvProgressPhase, ProgressHandler};

/// Directory name of the project environment, relative to the project root.
pub const DEFAULT_ENV_DIR: &str = ".venv";

/// Packages needed by the asset scripts.
pub const DEFAULT_PACKAGES: &[&str] = &["numpy", "pillow"];

/// What to build: where the environment lives and what goes into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSpec {
    #[serde(default = "default_env_path")]
    pub path: PathBuf,

    #[serde(default = "default_packages", deserialize_with = "package_list")]
    pub packages: Vec<String>,
}

fn default_env_path() -> PathBuf {
    PathBuf::from(DEFAULT_ENV_DIR)
}

fn default_packages() -> Vec<String> {
    DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect()
}

/// Package lists are written either as `"numpy, pillow"` or as an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PackageList {
    Joined(String),
    Items(Vec<String>),
}

fn package_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match PackageList::deserialize(deserializer)? {
        PackageList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        PackageList::Items(items) => items,
    };
    Ok(items
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}

impl Default for EnvSpec {
    fn default() -> Self {
        Self {
            path: default_env_path(),
            packages: default_packages(),
        }
    }
}

impl EnvSpec {
    /// The environment path, resolved against `root` when relative.
    pub fn env_path_in(&self, root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            root.join(&self.path)
        }
    }
}

/// Handle to a created environment.
///
/// Stands in for shell activation: commands that must run inside the
/// environment are built from this handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimEnvironment {
    pub env_path: PathBuf,
    pub python_path: PathBuf,
}

impl SimEnvironment {
    /// Handle for an environment rooted at `env_path`.
    pub fn at(env_path: &Path) -> Self {
        Self {
            env_path: env_path.to_path_buf(),
            python_path: python_path_for(env_path),
        }
    }

    /// Directory holding the environment's executables.
    pub fn bin_dir(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            self.env_path.join("Scripts")
        }
        #[cfg(not(target_os = "windows"))]
        {
            self.env_path.join("bin")
        }
    }

    /// A command running the environment's interpreter with `VIRTUAL_ENV`
    /// set and the environment's bin directory first on `PATH`.
    pub fn python_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.python_path);
        cmd.env("VIRTUAL_ENV", &self.env_path);

        let mut paths = vec![self.bin_dir()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        if let Ok(joined) = std::env::join_paths(paths) {
            cmd.env("PATH", joined);
        }
        cmd.env_remove("PYTHONHOME");
        cmd
    }
}

fn python_path_for(env_path: &Path) -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        env_path.join("Scripts").join("python.exe")
    }
    #[cfg(not(target_os = "windows"))]
    {
        env_path.join("bin").join("python")
    }
}

/// What to do when one package fails to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallPolicy {
    /// Stop at the first failure and return it.
    #[default]
    FailFast,
    /// Try every package and record failures in the report.
    BestEffort,
}

/// Result of installing one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOutcome {
    pub package: String,
    pub error: Option<String>,
}

/// Per-package outcomes, in install order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub outcomes: Vec<PackageOutcome>,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.error.is_none())
    }

    pub fn installed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.error.is_none())
            .map(|o| o.package.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PackageOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

/// Delete whatever is at `env_path`. A missing path is not an error.
///
/// Returns whether anything was removed.
pub async fn remove_environment(env_path: &Path) -> Result<bool> {
    let metadata = match tokio::fs::symlink_metadata(env_path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(BootstrapError::Filesystem {
                path: env_path.to_path_buf(),
                source,
            })
        }
    };

    let removed = if metadata.is_dir() {
        tokio::fs::remove_dir_all(env_path).await
    } else {
        tokio::fs::remove_file(env_path).await
    };
    removed.map_err(|source| BootstrapError::Filesystem {
        path: env_path.to_path_buf(),
        source,
    })?;

    Ok(true)
}

/// Install `packages` into `env` one at a time, in order.
///
/// Under [`InstallPolicy::FailFast`] the first failure is returned and later
/// packages are not attempted.
pub async fn install_packages<B: EnvBackend>(
    env: &SimEnvironment,
    packages: &[String],
    backend: &B,
    policy: InstallPolicy,
    handler: &dyn ProgressHandler,
) -> Result<InstallReport> {
    let env_type = backend.name();
    let install_start = Instant::now();
    let mut report = InstallReport::default();

    for (i, package) in packages.iter().enumerate() {
        handler.on_progress(
            env_type,
            EnvProgressPhase::InstallingPackage {
                package: package.clone(),
                index: i + 1,
                total: packages.len(),
            },
        );

        let started = Instant::now();
        match backend.install(env, package).await {
            Ok(()) => {
                handler.on_progress(
                    env_type,
                    EnvProgressPhase::PackageInstalled {
                        package: package.clone(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    },
                );
                report.outcomes.push(PackageOutcome {
                    package: package.clone(),
                    error: None,
                });
            }
            Err(e) => {
                handler.on_progress(
                    env_type,
                    EnvProgressPhase::Error {
                        message: e.to_string(),
                    },
                );
                if policy == InstallPolicy::FailFast {
                    return Err(e);
                }
                report.outcomes.push(PackageOutcome {
                    package: package.clone(),
                    error: Some(e.to_string()),
                });
            }
        }
    }

    handler.on_progress(
        env_type,
        EnvProgressPhase::InstallComplete {
            elapsed_ms: install_start.elapsed().as_millis() as u64,
        },
    );

    Ok(report)
}

/// Delete, recreate and populate the environment at `env_path`.
///
/// Any previous environment is removed unconditionally. Packages are
/// installed in list order and the first failure aborts the rest, leaving a
/// partially populated environment behind.
pub async fn rebuild_environment<B: EnvBackend>(
    env_path: &Path,
    packages: &[String],
    backend: &B,
    handler: &dyn ProgressHandler,
) -> Result<SimEnvironment> {
    let env_type = backend.name();
    let display = env_path.to_string_lossy().to_string();

    handler.on_progress(
        env_type,
        EnvProgressPhase::Starting {
            env_path: display.clone(),
            packages: packages.to_vec(),
        },
    );

    if tokio::fs::symlink_metadata(env_path).await.is_ok() {
        handler.on_progress(
            env_type,
            EnvProgressPhase::Removing {
                env_path: display.clone(),
            },
        );
    }
    if let Err(e) = remove_environment(env_path).await {
        handler.on_progress(
            env_type,
            EnvProgressPhase::Error {
                message: e.to_string(),
            },
        );
        return Err(e);
    }

    if let Some(parent) = env_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BootstrapError::Filesystem {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    handler.on_progress(env_type, EnvProgressPhase::CreatingVenv);
    let env = match backend.create(env_path).await {
        Ok(env) => env,
        Err(e) => {
            handler.on_progress(
                env_type,
                EnvProgressPhase::Error {
                    message: e.to_string(),
                },
            );
            return Err(e);
        }
    };

    install_packages(&env, packages, backend, InstallPolicy::FailFast, handler).await?;

    info!("Environment ready at {:?}", env.env_path);
    handler.on_progress(
        env_type,
        EnvProgressPhase::Ready {
            env_path: env.env_path.to_string_lossy().to_string(),
            python_path: env.python_path.to_string_lossy().to_string(),
        },
    );

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec() {
        let spec = EnvSpec::default();
        assert_eq!(spec.path, PathBuf::from(".venv"));
        assert_eq!(spec.packages, vec!["numpy", "pillow"]);
    }

    #[test]
    fn test_spec_missing_fields_use_defaults() {
        let spec: EnvSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, EnvSpec::default());
    }

    #[test]
    fn test_spec_comma_separated_packages() {
        let spec: EnvSpec =
            serde_json::from_str(r#"{"path": "env", "packages": "numpy, pillow, , scipy"}"#)
                .unwrap();
        assert_eq!(spec.path, PathBuf::from("env"));
        assert_eq!(spec.packages, vec!["numpy", "pillow", "scipy"]);
    }

    #[test]
    fn test_spec_array_packages() {
        let spec: EnvSpec =
            serde_json::from_str(r#"{"packages": [" numpy ", "", "pillow"]}"#).unwrap();
        assert_eq!(spec.packages, vec!["numpy", "pillow"]);
    }

    #[test]
    fn test_env_path_in_root() {
        let spec = EnvSpec::default();
        let root = Path::new("/work/sim");
        assert_eq!(spec.env_path_in(root), root.join(".venv"));

        let absolute = EnvSpec {
            path: std::env::temp_dir().join("env"),
            ..Default::default()
        };
        assert_eq!(absolute.env_path_in(root), absolute.path);
    }

    #[test]
    fn test_python_path_layout() {
        let env = SimEnvironment::at(Path::new("venv"));
        assert!(env.python_path.starts_with("venv"));
        assert!(env.python_path.starts_with(env.bin_dir()));
    }

    #[test]
    fn test_report_accessors() {
        let report = InstallReport {
            outcomes: vec![
                PackageOutcome {
                    package: "numpy".into(),
                    error: None,
                },
                PackageOutcome {
                    package: "pillow".into(),
                    error: Some("no wheel".into()),
                },
            ],
        };
        assert!(!report.is_success());
        assert_eq!(report.installed().collect::<Vec<_>>(), vec!["numpy"]);
        assert_eq!(report.failed().count(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!remove_environment(&dir.path().join("absent")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".venv");
        std::fs::write(&path, b"not a directory").unwrap();
        assert!(remove_environment(&path).await.unwrap());
        assert!(!path.exists());
    }
}
