//! Choosing what `cargo` should run for the file being edited.
//!
//! Rules are checked top to bottom; the first match builds the invocation.
//! When nothing matches (or no file is given) the default binary runs.

use std::path::{Component, Path};
use std::process::Command;

/// Extension of sources cargo builds as example targets.
const SOURCE_EXTENSION: &str = "rs";

/// Directory cargo discovers example targets in.
const EXAMPLES_DIR: &str = "examples";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A command to run, and which rule produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub rule: &'static str,
    pub program: String,
    pub args: Vec<String>,
    /// Status line printed before running.
    pub description: String,
}

impl Invocation {
    /// The process to spawn, with `root` as its working directory.
    pub fn command(&self, root: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(root);
        cmd
    }
}

/// A predicate over the input path paired with the invocation it selects.
pub struct DispatchRule {
    pub name: &'static str,
    pub matches: fn(&Path) -> bool,
    pub build: fn(&Path) -> Invocation,
}

pub const RULES: &[DispatchRule] = &[DispatchRule {
    name: "example",
    matches: is_example_source,
    build: example_invocation,
}];

/// A `.rs` file with an `examples` directory somewhere above it.
fn is_example_source(path: &Path) -> bool {
    let is_source = path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION);
    let under_examples = path
        .parent()
        .map(|dir| {
            dir.components()
                .any(|c| matches!(c, Component::Normal(name) if name == EXAMPLES_DIR))
        })
        .unwrap_or(false);

    is_source && under_examples && path.file_stem().is_some()
}

fn example_invocation(path: &Path) -> Invocation {
    let target = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    Invocation {
        rule: "example",
        program: "cargo".to_string(),
        args: vec!["run".to_string(), "--example".to_string(), target.clone()],
        description: format!("Running example: {target}"),
    }
}

fn default_invocation() -> Invocation {
    Invocation {
        rule: "default",
        program: "cargo".to_string(),
        args: vec!["run".to_string()],
        description: "Running main binary".to_string(),
    }
}

/// Pick the invocation for `argv`. Only the first argument is looked at; it
/// is treated as a file path and may be absent.
pub fn select_command(argv: &[String]) -> Invocation {
    let Some(arg) = argv.first().map(|a| a.trim()).filter(|a| !a.is_empty()) else {
        return default_invocation();
    };

    // Editors on Windows hand over backslash paths.
    let normalized = arg.replace('\\', "/");
    let path = Path::new(&normalized);

    RULES
        .iter()
        .find(|rule| (rule.matches)(path))
        .map(|rule| {
            log::debug!("{} matched rule {:?}", path.display(), rule.name);
            (rule.build)(path)
        })
        .unwrap_or_else(default_invocation)
}

/// Print the branch taken, run the invocation from `root` and return its
/// exit code. A missing example target is cargo's error to report.
pub fn run_invocation(invocation: &Invocation, root: &Path) -> Result<i32, DispatchError> {
    println!("{}", invocation.description);
    log::debug!(
        "[{}] {} {}",
        invocation.rule,
        invocation.program,
        invocation.args.join(" ")
    );

    let status = invocation
        .command(root)
        .status()
        .map_err(|source| DispatchError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

    Ok(status.code().unwrap_or(1))
}
