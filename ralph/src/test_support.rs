//! Test-only helpers: plan builders, scripted agents, git-backed temp repos.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use serde_json::Map;

use crate::core::types::{InvokeFailure, InvokeOutcome};
use crate::io::agent::{Agent, InvokeRequest};
use crate::io::config::{CONFIG_FILE, LoopConfig, load_config, write_config};
use crate::io::plan_store::{PLAN_FILE, load_plan, write_plan};
use crate::plan::{Plan, Story};

/// Create a deterministic story with default fields.
pub fn story(id: u64, passes: bool) -> Story {
    Story {
        id,
        title: format!("Story {id}"),
        description: format!("Implement story {id}"),
        acceptance_criteria: vec![format!("Criterion for story {id}")],
        passes,
        extra: Map::new(),
    }
}

/// Create a story with explicit acceptance criteria.
pub fn story_with_criteria(id: u64, title: &str, criteria: &[&str]) -> Story {
    Story {
        id,
        title: title.to_string(),
        description: format!("{title} description"),
        acceptance_criteria: criteria.iter().map(|c| c.to_string()).collect(),
        passes: false,
        extra: Map::new(),
    }
}

/// Create a plan with deterministic metadata and the given items.
pub fn plan_with_items(items: Vec<Story>) -> Plan {
    Plan {
        title: "Test project".to_string(),
        overview: "Project used by tests".to_string(),
        tech_stack: serde_json::Value::Null,
        items,
        extra: Map::new(),
    }
}

/// One scripted agent invocation.
#[derive(Debug, Clone)]
pub struct ScriptedInvoke {
    pub outcome: InvokeOutcome,
    /// Optional file (relative path, contents) written into the workdir to
    /// simulate an implementation side effect.
    pub side_effect: Option<(String, String)>,
}

impl ScriptedInvoke {
    pub fn success() -> Self {
        Self {
            outcome: InvokeOutcome::Success,
            side_effect: None,
        }
    }

    pub fn success_with_file(rel_path: &str, contents: &str) -> Self {
        Self {
            outcome: InvokeOutcome::Success,
            side_effect: Some((rel_path.to_string(), contents.to_string())),
        }
    }

    pub fn failure(failure: InvokeFailure) -> Self {
        Self {
            outcome: InvokeOutcome::Failure(failure),
            side_effect: None,
        }
    }
}

/// Agent double that replays a fixed script without spawning processes.
pub struct ScriptedAgent {
    script: RefCell<VecDeque<ScriptedInvoke>>,
}

impl ScriptedAgent {
    pub fn new(script: Vec<ScriptedInvoke>) -> Self {
        Self {
            script: RefCell::new(script.into()),
        }
    }
}

impl Agent for ScriptedAgent {
    fn invoke(&self, request: &InvokeRequest) -> Result<InvokeOutcome> {
        let scripted = self
            .script
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted agent exhausted"))?;
        if let Some((rel_path, contents)) = &scripted.side_effect {
            let path = request.workdir.join(rel_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(scripted.outcome)
    }
}

/// Agent double whose every invocation fails with a non-zero exit.
pub struct FailingAgent;

impl Agent for FailingAgent {
    fn invoke(&self, _request: &InvokeRequest) -> Result<InvokeOutcome> {
        Ok(InvokeOutcome::Failure(InvokeFailure::NonZeroExit {
            code: Some(1),
        }))
    }
}

/// Temp directory with an initialized git repo, a committed loop config with
/// zero throttle delay, and helpers for seeding and inspecting the plan.
pub struct TestRepo {
    temp: tempfile::TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let repo = Self { temp };
        let root = repo.root().to_path_buf();

        run_git(&root, &["init"])?;
        run_git(&root, &["config", "user.email", "test@example.com"])?;
        run_git(&root, &["config", "user.name", "test"])?;

        fs::write(root.join("README.md"), "test repo\n").context("write README")?;
        write_config(
            &root.join(CONFIG_FILE),
            &LoopConfig {
                iteration_delay_secs: 0,
                ..LoopConfig::default()
            },
        )?;
        repo.commit_all("chore: init test repo")?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Seed (or replace) the plan document and commit it.
    pub fn write_plan(&self, plan: &Plan) -> Result<()> {
        write_plan(&self.root().join(PLAN_FILE), plan)?;
        self.commit_all("chore: seed plan")
    }

    pub fn read_plan(&self) -> Result<Plan> {
        load_plan(&self.root().join(PLAN_FILE))
    }

    pub fn config(&self) -> LoopConfig {
        load_config(&self.root().join(CONFIG_FILE)).expect("load test config")
    }

    /// Lower the iteration cap (committed, so the tree stays clean).
    pub fn set_max_iterations(&self, cap: u32) -> Result<()> {
        let cfg = LoopConfig {
            max_iterations: cap,
            ..self.config()
        };
        write_config(&self.root().join(CONFIG_FILE), &cfg)?;
        self.commit_all("chore: set iteration cap")
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        run_git(self.root(), &["add", "-A"])?;
        run_git(self.root(), &["commit", "-m", message])?;
        Ok(())
    }

    /// Commit subjects, newest first.
    pub fn log_subjects(&self) -> Result<Vec<String>> {
        let out = Command::new("git")
            .args(["log", "--pretty=%s"])
            .current_dir(self.root())
            .output()
            .context("git log")?;
        if !out.status.success() {
            return Err(anyhow!(
                "git log failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(|line| line.to_string())
            .collect())
    }
}

fn run_git(root: &Path, args: &[&str]) -> Result<()> {
    let out = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !out.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    Ok(())
}
