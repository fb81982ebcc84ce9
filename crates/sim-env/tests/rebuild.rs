//! Integration tests for environment rebuilds against a fake backend.
//!
//! The fake backend lays out a directory that looks like a virtual
//! environment and records installs as files, so the tests never need uv or
//! Python on PATH.

use std::path::Path;
use std::sync::Mutex;

use sim_env::{
    install_packages, rebuild_environment, BootstrapError, EnvBackend, EnvProgressPhase,
    InstallPolicy, ProgressHandler, SimEnvironment,
};

#[derive(Default)]
struct FakeBackend {
    installs: Mutex<Vec<String>>,
    fail_package: Option<&'static str>,
    fail_create: bool,
}

impl FakeBackend {
    fn failing_on(package: &'static str) -> Self {
        Self {
            fail_package: Some(package),
            ..Default::default()
        }
    }

    fn installs(&self) -> Vec<String> {
        self.installs.lock().unwrap().clone()
    }
}

impl EnvBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create(&self, env_path: &Path) -> sim_env::Result<SimEnvironment> {
        if self.fail_create {
            return Err(BootstrapError::CreateFailed {
                path: env_path.to_path_buf(),
                stderr: "no interpreter".into(),
            });
        }
        let env = SimEnvironment::at(env_path);
        std::fs::create_dir_all(env.bin_dir()).unwrap();
        std::fs::write(&env.python_path, b"#!/bin/sh\n").unwrap();
        std::fs::create_dir_all(env_path.join("lib")).unwrap();
        Ok(env)
    }

    async fn install(&self, env: &SimEnvironment, package: &str) -> sim_env::Result<()> {
        self.installs.lock().unwrap().push(package.to_string());
        if self.fail_package == Some(package) {
            return Err(BootstrapError::PackageInstall {
                package: package.to_string(),
                stderr: "No matching distribution found".into(),
            });
        }
        std::fs::write(env.env_path.join("lib").join(package), b"").unwrap();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHandler {
    phases: Mutex<Vec<EnvProgressPhase>>,
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, env_type: &str, phase: EnvProgressPhase) {
        assert_eq!(env_type, "fake");
        self.phases.lock().unwrap().push(phase);
    }
}

fn packages() -> Vec<String> {
    vec!["numpy".to_string(), "pillow".to_string()]
}

#[tokio::test]
async fn test_rebuild_destroys_previous_environment() {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join(".venv");
    std::fs::create_dir_all(env_path.join("lib")).unwrap();
    let marker = env_path.join("lib").join("left-over-package");
    std::fs::write(&marker, b"old").unwrap();

    let backend = FakeBackend::default();
    let env = rebuild_environment(&env_path, &packages(), &backend, &sim_env::LogHandler)
        .await
        .unwrap();

    assert!(!marker.exists());
    assert_eq!(env.env_path, env_path);
    assert!(env.python_path.exists());
}

#[tokio::test]
async fn test_rebuild_without_existing_environment() {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join("nested").join(".venv");
    let handler = RecordingHandler::default();

    let backend = FakeBackend::default();
    rebuild_environment(&env_path, &packages(), &backend, &handler)
        .await
        .unwrap();

    assert!(env_path.join("lib").join("numpy").exists());
    let phases = handler.phases.into_inner().unwrap();
    assert!(!phases
        .iter()
        .any(|p| matches!(p, EnvProgressPhase::Removing { .. })));
    assert!(matches!(phases.last(), Some(EnvProgressPhase::Ready { .. })));
}

#[tokio::test]
async fn test_packages_installed_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend::default();
    let list = vec![
        "pillow".to_string(),
        "numpy".to_string(),
        "scipy".to_string(),
    ];

    rebuild_environment(&dir.path().join(".venv"), &list, &backend, &sim_env::LogHandler)
        .await
        .unwrap();

    assert_eq!(backend.installs(), list);
}

#[tokio::test]
async fn test_install_failure_aborts_remaining() {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join(".venv");
    let backend = FakeBackend::failing_on("numpy");
    let list = vec![
        "numpy".to_string(),
        "pillow".to_string(),
    ];

    let err = rebuild_environment(&env_path, &list, &backend, &sim_env::LogHandler)
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::PackageInstall { ref package, .. } if package == "numpy"));
    assert_eq!(backend.installs(), vec!["numpy"]);
    // The environment itself was created and stays behind.
    assert!(env_path.exists());
    assert!(!env_path.join("lib").join("pillow").exists());
}

#[tokio::test]
async fn test_create_failure_skips_installs() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend {
        fail_create: true,
        ..Default::default()
    };
    let handler = RecordingHandler::default();

    let err = rebuild_environment(&dir.path().join(".venv"), &packages(), &backend, &handler)
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::CreateFailed { .. }));
    assert!(backend.installs().is_empty());
    let phases = handler.phases.into_inner().unwrap();
    assert!(matches!(phases.last(), Some(EnvProgressPhase::Error { .. })));
}

#[tokio::test]
async fn test_best_effort_install_reports_each_package() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend::failing_on("numpy");
    let env = backend.create(&dir.path().join(".venv")).await.unwrap();

    let report = install_packages(
        &env,
        &packages(),
        &backend,
        InstallPolicy::BestEffort,
        &sim_env::LogHandler,
    )
    .await
    .unwrap();

    assert_eq!(backend.installs(), vec!["numpy", "pillow"]);
    assert!(!report.is_success());
    assert_eq!(report.installed().collect::<Vec<_>>(), vec!["pillow"]);
    assert_eq!(report.failed().next().unwrap().package, "numpy");
}

#[tokio::test]
async fn test_empty_package_list() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend::default();
    let env = rebuild_environment(&dir.path().join(".venv"), &[], &backend, &sim_env::LogHandler)
        .await
        .unwrap();

    assert!(env.env_path.exists());
    assert!(backend.installs().is_empty());
}
