//! Terminal output for long-running commands.

use kernel_fetch::{FetchEvent, FetchReporter, KernelFile};
use sim_env::{EnvProgressPhase, ProgressHandler};

/// Prints the kernel download status lines.
pub struct ConsoleReporter;

impl FetchReporter for ConsoleReporter {
    fn on_event(&self, event: FetchEvent) {
        match event {
            FetchEvent::Starting { dest_dir, .. } => {
                println!("Downloading to {}", dest_dir.display());
            }
            FetchEvent::Downloading { local_filename, .. } => {
                println!("Downloading {local_filename}...");
            }
            FetchEvent::Fetched {
                local_filename,
                bytes,
            } => {
                println!("  {local_filename}: {}", human_size(bytes));
            }
            FetchEvent::Failed {
                local_filename,
                message,
            } => {
                eprintln!("  {local_filename} failed: {message}");
            }
            FetchEvent::Finished { fetched, failed } => {
                if failed == 0 {
                    println!("=== Downloaded {fetched} kernels ===");
                } else {
                    println!("=== Downloaded {fetched} kernels, {failed} failed ===");
                }
            }
        }
    }
}

/// Prints environment rebuild progress.
pub struct ConsoleHandler;

impl ProgressHandler for ConsoleHandler {
    fn on_progress(&self, env_type: &str, phase: EnvProgressPhase) {
        match phase {
            EnvProgressPhase::Starting { env_path, .. } => {
                println!("Rebuilding Python environment at {env_path} ({env_type})");
            }
            EnvProgressPhase::Removing { env_path } => {
                println!("Removing {env_path}...");
            }
            EnvProgressPhase::CreatingVenv => {
                println!("Creating virtual environment...");
            }
            EnvProgressPhase::InstallingPackage { package, .. } => {
                println!("Installing {package}...");
            }
            EnvProgressPhase::Ready { python_path, .. } => {
                println!("Environment ready: {python_path}");
            }
            EnvProgressPhase::Error { message } => {
                eprintln!("Error: {message}");
            }
            EnvProgressPhase::PackageInstalled { .. }
            | EnvProgressPhase::InstallComplete { .. } => {}
        }
    }
}

pub fn print_listing(files: &[KernelFile]) {
    if files.is_empty() {
        println!("No kernel files (.bsp, .tls, .tpc) present");
        return;
    }
    for file in files {
        println!("{:>10}  {}", human_size(file.size), file.name);
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
