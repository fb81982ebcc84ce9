//! The project root every command works relative to, and the optional
//! `xtask.toml` settings file found there.
//!
//! ```toml
//! [env]
//! path = ".venv"
//! packages = "numpy, pillow, scipy"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use sim_env::EnvSpec;

/// Where the simulator loads its SPICE kernels from, relative to the root.
pub const ASSETS_DIR: &str = "assets/spice";

/// Settings file name, relative to the root.
pub const CONFIG_FILE: &str = "xtask.toml";

/// Contents of `xtask.toml`. Every table is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub env: EnvSpec,
}

/// Explicit project root, passed to each command instead of changing the
/// process working directory.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    root: PathBuf,
}

impl ProjectContext {
    /// Use `root`, or the current directory when not given.
    pub fn new(root: Option<PathBuf>) -> std::io::Result<Self> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `path` resolved against the root when relative.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// Read `xtask.toml` from the root. A missing file yields the defaults.
    pub fn load_config(&self) -> anyhow::Result<ProjectConfig> {
        let path = self.root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProjectConfig::default())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
