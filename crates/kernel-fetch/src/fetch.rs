//! Fetching a manifest into a destination directory.
//!
//! Entries are fetched one at a time in manifest order. Each body is
//! streamed into `<local>.part` and renamed over `<local>` once complete, so
//! an existing kernel is only replaced by a fully downloaded one.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;

use crate::error::{ProvisionError, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::transport::Transport;

/// File extensions the simulator loads: SPK ephemerides, leap-second and
/// planetary-constant text kernels.
pub const KERNEL_EXTENSIONS: &[&str] = &["bsp", "tls", "tpc"];

/// What to do when one entry fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Stop at the first failure and return it. Later entries are not attempted.
    #[default]
    FailFast,
    /// Attempt every entry and record failures in the report.
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Fetched { bytes: u64 },
    Failed { message: String },
}

/// Result of fetching one manifest entry.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub local_filename: String,
    pub url: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl FetchOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self.status, OutcomeStatus::Fetched { .. })
    }
}

/// Per-entry outcomes of a [`fetch_all`] run, in manifest order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub dest_dir: PathBuf,
    pub outcomes: Vec<FetchOutcome>,
}

impl FetchReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(FetchOutcome::is_fetched)
    }

    pub fn fetched(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| o.is_fetched())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_fetched())
    }

    pub fn total_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                OutcomeStatus::Fetched { bytes } => bytes,
                OutcomeStatus::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Progress events emitted while fetching.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FetchEvent {
    Starting { dest_dir: PathBuf, total: usize },
    Downloading { local_filename: String, url: String },
    Fetched { local_filename: String, bytes: u64 },
    Failed { local_filename: String, message: String },
    Finished { fetched: usize, failed: usize },
}

/// Receives [`FetchEvent`]s. Implement this to route progress to a console
/// or any other sink.
pub trait FetchReporter {
    fn on_event(&self, event: FetchEvent);
}

/// Writes fetch events to the `log` crate.
pub struct LogReporter;

impl FetchReporter for LogReporter {
    fn on_event(&self, event: FetchEvent) {
        match event {
            FetchEvent::Starting { dest_dir, total } => {
                info!("[kernels] Fetching {total} kernels into {:?}", dest_dir);
            }
            FetchEvent::Downloading {
                local_filename,
                url,
            } => {
                info!("[kernels] Downloading {local_filename} from {url}");
            }
            FetchEvent::Fetched {
                local_filename,
                bytes,
            } => {
                info!("[kernels] {local_filename}: {bytes} bytes");
            }
            FetchEvent::Failed {
                local_filename,
                message,
            } => {
                error!("[kernels] {local_filename}: {message}");
            }
            FetchEvent::Finished { fetched, failed } => {
                info!("[kernels] Finished: {fetched} fetched, {failed} failed");
            }
        }
    }
}

/// Fetch a single entry into `dest_dir`, replacing any existing file.
///
/// Returns the number of bytes written.
pub async fn fetch_entry<T: Transport>(
    manifest: &Manifest,
    entry: &ManifestEntry,
    dest_dir: &Path,
    transport: &T,
) -> Result<u64> {
    let url = manifest.url_for(entry);
    let dest = dest_dir.join(&entry.local_filename);
    let partial = dest_dir.join(format!("{}.part", entry.local_filename));

    match transport.download(&url, &partial).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, &dest)
                .await
                .map_err(|e| ProvisionError::fs(&dest, e))?;
            Ok(bytes)
        }
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove partial download {:?}: {}", partial, rm);
                }
            }
            Err(e)
        }
    }
}

/// Fetch every manifest entry into `dest_dir`, in order.
///
/// `dest_dir` is created if missing. Under [`FetchPolicy::FailFast`] the
/// first failing entry is returned as the error and nothing after it is
/// attempted. Under [`FetchPolicy::BestEffort`] all entries are attempted
/// and the returned report records each outcome.
pub async fn fetch_all<T: Transport>(
    manifest: &Manifest,
    dest_dir: &Path,
    transport: &T,
    policy: FetchPolicy,
    reporter: &dyn FetchReporter,
) -> Result<FetchReport> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| ProvisionError::fs(dest_dir, e))?;

    reporter.on_event(FetchEvent::Starting {
        dest_dir: dest_dir.to_path_buf(),
        total: manifest.len(),
    });

    let mut report = FetchReport {
        dest_dir: dest_dir.to_path_buf(),
        outcomes: Vec::with_capacity(manifest.len()),
    };

    for entry in manifest.entries() {
        let url = manifest.url_for(entry);
        reporter.on_event(FetchEvent::Downloading {
            local_filename: entry.local_filename.clone(),
            url: url.clone(),
        });

        let status = match fetch_entry(manifest, entry, dest_dir, transport).await {
            Ok(bytes) => {
                reporter.on_event(FetchEvent::Fetched {
                    local_filename: entry.local_filename.clone(),
                    bytes,
                });
                OutcomeStatus::Fetched { bytes }
            }
            Err(e) => {
                reporter.on_event(FetchEvent::Failed {
                    local_filename: entry.local_filename.clone(),
                    message: e.to_string(),
                });
                if policy == FetchPolicy::FailFast {
                    return Err(e);
                }
                OutcomeStatus::Failed {
                    message: e.to_string(),
                }
            }
        };

        report.outcomes.push(FetchOutcome {
            local_filename: entry.local_filename.clone(),
            url,
            path: dest_dir.join(&entry.local_filename),
            status,
        });
    }

    reporter.on_event(FetchEvent::Finished {
        fetched: report.fetched().count(),
        failed: report.failed().count(),
    });

    Ok(report)
}

/// A kernel file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelFile {
    pub name: String,
    pub size: u64,
}

/// List files in `dir` whose extension is one of [`KERNEL_EXTENSIONS`],
/// sorted by name. A missing directory lists as empty.
pub fn list_kernels(dir: &Path) -> Result<Vec<KernelFile>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ProvisionError::fs(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ProvisionError::fs(dir, e))?;
        let path = entry.path();

        let is_kernel = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| KERNEL_EXTENSIONS.iter().any(|k| k.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !is_kernel {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| ProvisionError::fs(&path, e))?;
        if !metadata.is_file() {
            continue;
        }

        files.push(KernelFile {
            name: entry.file_name().to_string_lossy().to_string(),
            size: metadata.len(),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
