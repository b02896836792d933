//! Orchestration for one loop iteration: invoke, commit, record.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::progress::mark_passed;
use crate::core::types::{CommitOutcome, InvokeOutcome};
use crate::io::agent::{Agent, InvokeRequest};
use crate::io::config::LoopConfig;
use crate::io::git::Git;
use crate::io::iteration_log::{IterationPaths, write_report};
use crate::io::plan_store::{PLAN_FILE, load_plan, write_plan};
use crate::io::prompt::{PromptBuilder, PromptInputs};
use crate::plan::{Plan, Story};

/// Result of one iteration, surfaced to the loop and serialized into the
/// iteration scratch directory.
#[derive(Debug, Clone, Serialize)]
pub struct StoryReport {
    /// Iteration number (1-indexed).
    pub iter: u32,
    /// Id of the story that was worked on.
    pub story_id: u64,
    /// Title of the story that was worked on.
    pub title: String,
    /// Completion signal from the agent.
    pub invocation: InvokeOutcome,
    /// Working-tree commit outcome; `None` when the invocation failed.
    pub commit: Option<CommitOutcome>,
    /// Whether the plan was rewritten with `passes=true` for this story.
    pub progress_recorded: bool,
}

/// Run one story through the agent, commit any resulting changes, and record
/// completion in the plan.
///
/// Invocation failure short-circuits: no commit, no progress, the story stays
/// eligible for the next pass.
#[instrument(skip_all, fields(story_id = story.id, iter))]
pub fn run_story<A: Agent>(
    root: &Path,
    agent: &A,
    plan: &Plan,
    story: &Story,
    iter: u32,
    config: &LoopConfig,
) -> Result<StoryReport> {
    let paths = IterationPaths::prepare(root, iter)?;

    let inputs = PromptInputs::from_plan(root, plan, story);
    let prompt = PromptBuilder::new(config.prompt_budget_bytes).build(&inputs)?;
    fs::write(&paths.prompt_path, &prompt)
        .with_context(|| format!("write prompt {}", paths.prompt_path.display()))?;

    let request = InvokeRequest {
        workdir: root.to_path_buf(),
        prompt,
        agent_log_path: paths.agent_log_path.clone(),
        timeout: std::time::Duration::from_secs(config.agent_timeout_secs),
        output_limit_bytes: config.agent_output_limit_bytes,
    };
    let invocation = agent.invoke(&request)?;

    if let InvokeOutcome::Failure(reason) = &invocation {
        warn!(story_id = story.id, %reason, "invocation failed, story stays open");
        let report = StoryReport {
            iter,
            story_id: story.id,
            title: story.title.clone(),
            invocation,
            commit: None,
            progress_recorded: false,
        };
        write_report(&paths.report_path, &report)?;
        return Ok(report);
    }

    let git = Git::new(root);
    let commit = commit_story_changes(&git, story)?;
    record_progress(root, &git, story.id)?;
    info!(story_id = story.id, "story recorded as passed");

    let report = StoryReport {
        iter,
        story_id: story.id,
        title: story.title.clone(),
        invocation,
        commit: Some(commit),
        progress_recorded: true,
    };
    write_report(&paths.report_path, &report)?;
    Ok(report)
}

/// Inspect the working tree and commit whatever the agent changed.
fn commit_story_changes(git: &Git, story: &Story) -> Result<CommitOutcome> {
    if !git.has_uncommitted_changes()? {
        warn!(
            story_id = story.id,
            "agent succeeded without file changes, nothing to commit"
        );
        return Ok(CommitOutcome::NoChanges);
    }
    git.add_all()?;
    let committed = git.commit_staged(&story_commit_message(story))?;
    if !committed {
        warn!(story_id = story.id, "nothing staged for story commit");
        return Ok(CommitOutcome::NoChanges);
    }
    let pushed = push_best_effort(git);
    Ok(CommitOutcome::Committed { pushed })
}

/// Mark the story passed in a freshly loaded plan, rewrite it atomically, and
/// commit the plan update as its own history entry.
fn record_progress(root: &Path, git: &Git, story_id: u64) -> Result<()> {
    let plan_path = root.join(PLAN_FILE);
    let mut plan = load_plan(&plan_path)?;
    mark_passed(&mut plan, story_id).map_err(|err| anyhow!("record progress: {err}"))?;
    write_plan(&plan_path, &plan)?;

    git.add_all()?;
    let committed = git.commit_staged(&format!("chore(plan): story {story_id} passes"))?;
    if committed {
        push_best_effort(git);
    } else {
        warn!(story_id, "plan update produced no commit");
    }
    Ok(())
}

/// Attempt to publish; failure is logged and tolerated, the commit stays
/// local.
fn push_best_effort(git: &Git) -> bool {
    match git.push() {
        Ok(()) => true,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "push failed, commit kept locally");
            false
        }
    }
}

fn story_commit_message(story: &Story) -> String {
    let mut msg = format!("feat(story-{}): {}\n", story.id, story.title);
    if !story.acceptance_criteria.is_empty() {
        msg.push_str("\nAcceptance criteria:\n");
        for criterion in &story.acceptance_criteria {
            msg.push_str(&format!("- {criterion}\n"));
        }
    }
    msg
}
