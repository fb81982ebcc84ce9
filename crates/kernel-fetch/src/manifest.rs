//! The kernel manifest: which files to fetch and where they land.
//!
//! Manifests are TOML documents:
//!
//! ```toml
//! base_url = "https://naif.jpl.nasa.gov/pub/naif/generic_kernels"
//!
//! [[kernels]]
//! remote = "lsk/naif0012.tls"
//! local = "naif0012.tls"
//! group = "core"   # optional, defaults to core
//! ```
//!
//! The manifest shipped with the simulator is compiled in and available
//! through [`Manifest::builtin`].

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};

/// Base URL of the NAIF generic kernel archive.
pub const DEFAULT_BASE_URL: &str = "https://naif.jpl.nasa.gov/pub/naif/generic_kernels";

const BUILTIN_MANIFEST: &str = include_str!("../manifest.toml");

/// Which part of the manifest an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KernelGroup {
    /// Kernels the simulator always loads.
    #[default]
    Core,
    /// Natural satellite ephemerides (the extended manifest).
    Satellites,
}

impl std::fmt::Display for KernelGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelGroup::Core => write!(f, "core"),
            KernelGroup::Satellites => write!(f, "satellites"),
        }
    }
}

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the manifest's base URL.
    #[serde(rename = "remote")]
    pub remote_path: String,
    /// File name relative to the destination directory.
    #[serde(rename = "local")]
    pub local_filename: String,
    #[serde(default)]
    pub group: KernelGroup,
}

impl ManifestEntry {
    pub fn new(remote_path: impl Into<String>, local_filename: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_filename: local_filename.into(),
            group: KernelGroup::Core,
        }
    }

    pub fn with_group(mut self, group: KernelGroup) -> Self {
        self.group = group;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    base_url: Option<String>,
    #[serde(default)]
    kernels: Vec<ManifestEntry>,
}

/// An ordered, validated list of kernels to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    base_url: String,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from parts, validating it.
    pub fn new(base_url: impl Into<String>, entries: Vec<ManifestEntry>) -> Result<Self> {
        let manifest = Self {
            base_url: base_url.into(),
            entries,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// The manifest compiled into this crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_MANIFEST)
    }

    /// Parse a manifest from TOML. A missing `base_url` means the NAIF archive.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)?;
        Self::new(
            raw.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            raw.kernels,
        )
    }

    /// Load a manifest file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProvisionError::fs(path, e))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ProvisionError::Manifest(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.remote_path.trim_matches('/').is_empty() {
                return Err(ProvisionError::Manifest(format!(
                    "empty remote path for {:?}",
                    entry.local_filename
                )));
            }

            let name = entry.local_filename.as_str();
            if name.is_empty()
                || name == "."
                || name == ".."
                || name.contains('/')
                || name.contains('\\')
            {
                return Err(ProvisionError::Manifest(format!(
                    "local name must be a plain file name, got {name:?}"
                )));
            }

            if !seen.insert(name) {
                return Err(ProvisionError::Manifest(format!(
                    "duplicate local name {name:?}"
                )));
            }
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only entries in the given groups, preserving order.
    pub fn filtered(&self, groups: &[KernelGroup]) -> Self {
        Self {
            base_url: self.base_url.clone(),
            entries: self
                .entries
                .iter()
                .filter(|e| groups.contains(&e.group))
                .cloned()
                .collect(),
        }
    }

    /// Full URL for an entry.
    pub fn url_for(&self, entry: &ManifestEntry) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            entry.remote_path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_manifest_parses() {
        let manifest = Manifest::builtin().unwrap();
        assert_eq!(manifest.base_url(), DEFAULT_BASE_URL);
        assert_eq!(manifest.len(), 12);

        let core: Vec<String> = manifest
            .filtered(&[KernelGroup::Core])
            .entries()
            .iter()
            .map(|e| e.local_filename.clone())
            .collect();
        assert_eq!(
            core,
            vec!["de440s.bsp", "naif0012.tls", "pck00011.tpc", "gm_de440.tpc"]
        );
    }

    #[test]
    fn test_builtin_satellites() {
        let manifest = Manifest::builtin().unwrap();
        let satellites = manifest.filtered(&[KernelGroup::Satellites]);
        assert_eq!(satellites.len(), 8);
        assert!(satellites
            .entries()
            .iter()
            .all(|e| e.remote_path.starts_with("spk/satellites/")));
        assert_eq!(satellites.entries()[0].local_filename, "jup365.bsp");
    }

    #[test]
    fn test_filter_preserves_order() {
        let manifest = Manifest::builtin().unwrap();
        let all = manifest.filtered(&[KernelGroup::Core, KernelGroup::Satellites]);
        assert_eq!(all, manifest);
    }

    #[test]
    fn test_url_for_joins_single_slash() {
        let manifest = Manifest::new(
            "https://example.org/kernels/",
            vec![ManifestEntry::new("/lsk/naif0012.tls", "naif0012.tls")],
        )
        .unwrap();
        assert_eq!(
            manifest.url_for(&manifest.entries()[0]),
            "https://example.org/kernels/lsk/naif0012.tls"
        );
    }

    #[test]
    fn test_group_defaults_to_core() {
        let manifest = Manifest::from_toml_str(
            r#"
            [[kernels]]
            remote = "lsk/naif0012.tls"
            local = "naif0012.tls"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.base_url(), DEFAULT_BASE_URL);
        assert_eq!(manifest.entries()[0].group, KernelGroup::Core);
    }

    #[test]
    fn test_programmatic_groups_filter() {
        let manifest = Manifest::new(
            DEFAULT_BASE_URL,
            vec![
                ManifestEntry::new("spk/satellites/jup365.bsp", "jup365.bsp")
                    .with_group(KernelGroup::Satellites),
                ManifestEntry::new("lsk/naif0012.tls", "naif0012.tls"),
            ],
        )
        .unwrap();

        let core = manifest.filtered(&[KernelGroup::Core]);
        assert_eq!(core.len(), 1);
        assert_eq!(core.entries()[0].local_filename, "naif0012.tls");

        let satellites = manifest.filtered(&[KernelGroup::Satellites]);
        assert_eq!(satellites.entries()[0].group, KernelGroup::Satellites);
        assert_eq!(
            satellites.url_for(&satellites.entries()[0]),
            format!("{DEFAULT_BASE_URL}/spk/satellites/jup365.bsp")
        );
    }

    #[test]
    fn test_duplicate_local_names_rejected() {
        let err = Manifest::new(
            DEFAULT_BASE_URL,
            vec![
                ManifestEntry::new("a/one.bsp", "one.bsp"),
                ManifestEntry::new("b/one.bsp", "one.bsp"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Manifest(_)));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_local_name_with_separator_rejected() {
        for bad in ["../escape.bsp", "sub/file.bsp", "..", ""] {
            let result = Manifest::new(
                DEFAULT_BASE_URL,
                vec![ManifestEntry::new("spk/file.bsp", bad)],
            );
            assert!(result.is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let result = Manifest::new("ftp://naif.jpl.nasa.gov", vec![]);
        assert!(matches!(result, Err(ProvisionError::Manifest(_))));
    }

    #[test]
    fn test_empty_remote_rejected() {
        let result = Manifest::new(DEFAULT_BASE_URL, vec![ManifestEntry::new("/", "x.tls")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = Manifest::from_toml_str("kernels = 3");
        assert!(matches!(result, Err(ProvisionError::ManifestParse(_))));
    }
}
