//! SPICE kernel provisioning for the simulator.
//!
//! The simulator loads its ephemeris, leap-second and constants kernels from
//! fixed paths under `assets/spice/`. This crate downloads them from the NAIF
//! generic kernel archive. It includes:
//!
//! - A declarative, validated [`Manifest`] of `(remote path, local name)` pairs
//! - A [`Transport`] trait with a reqwest-backed [`HttpTransport`]
//! - [`fetch_all`], which fetches a manifest in order under a [`FetchPolicy`]
//! - [`list_kernels`], the listing of kernel files present on disk
//!
//! ```ignore
//! use kernel_fetch::{fetch_all, FetchPolicy, HttpTransport, KernelGroup, LogReporter, Manifest};
//!
//! let manifest = Manifest::builtin()?.filtered(&[KernelGroup::Core]);
//! let transport = HttpTransport::new(Default::default())?;
//! let dest = std::path::Path::new("assets/spice");
//! let report = fetch_all(&manifest, dest, &transport, FetchPolicy::FailFast, &LogReporter).await?;
//! ```

pub mod error;
pub mod fetch;
pub mod manifest;
pub mod transport;

pub use error::{ProvisionError, Result};
pub use fetch::{
    fetch_all, fetch_entry, list_kernels, FetchEvent, FetchOutcome, FetchPolicy, FetchReport,
    FetchReporter, KernelFile, LogReporter, OutcomeStatus, KERNEL_EXTENSIONS,
};
pub use manifest::{KernelGroup, Manifest, ManifestEntry, DEFAULT_BASE_URL};
pub use transport::{FetchOptions, HttpTransport, Transport};
