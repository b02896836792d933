//! Per-iteration scratch artifacts under `.ralph/iterations/`.
//!
//! Scratch output (rendered prompt, agent transcript, iteration report) is
//! observability only; the plan document remains the sole durable state. The
//! scratch directory ignores itself so it never shows up as a working-tree
//! modification.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

const SCRATCH_DIR: &str = ".ralph";

/// Paths for one iteration's scratch artifacts.
#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub prompt_path: PathBuf,
    pub agent_log_path: PathBuf,
    pub report_path: PathBuf,
}

impl IterationPaths {
    pub fn new(root: &Path, iter: u32) -> Self {
        let dir = root
            .join(SCRATCH_DIR)
            .join("iterations")
            .join(iter.to_string());
        Self {
            dir: dir.clone(),
            prompt_path: dir.join("prompt.md"),
            agent_log_path: dir.join("agent.log"),
            report_path: dir.join("report.json"),
        }
    }

    /// Create this iteration's directory, ensuring the scratch dir ignores
    /// itself first so nothing under it is ever staged.
    pub fn prepare(root: &Path, iter: u32) -> Result<Self> {
        ensure_scratch_gitignore(root)?;
        let paths = Self::new(root, iter);
        fs::create_dir_all(&paths.dir)
            .with_context(|| format!("create iteration dir {}", paths.dir.display()))?;
        Ok(paths)
    }
}

/// Write `.ralph/.gitignore` with a self-ignoring pattern if missing.
pub fn ensure_scratch_gitignore(root: &Path) -> Result<()> {
    let dir = root.join(SCRATCH_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(".gitignore");
    if !path.exists() {
        fs::write(&path, "*\n").with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

/// Serialize a value as pretty JSON with trailing newline.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(report)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write report {}", path.display()))
}
