//! The bounded story loop: select, invoke, commit, record, repeat.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::core::selector::next_open_story;
use crate::io::agent::Agent;
use crate::io::config::{CONFIG_FILE, load_config};
use crate::io::git::Git;
use crate::io::iteration_log::ensure_scratch_gitignore;
use crate::io::plan_store::{PLAN_FILE, load_plan};
use crate::step::{StoryReport, run_story};

/// Reason why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// Every story passes (or the plan has no items).
    Done,
    /// The iteration cap was reached with stories still open.
    Aborted { remaining: usize },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Iterations consumed (selected stories, successful or not).
    pub iterations: u32,
    /// Stories recorded as passed during this invocation.
    pub recorded: u32,
    /// Iterations that ended without recording progress.
    pub failed: u32,
    pub stop: LoopStop,
}

/// Drive stories through the agent until the plan completes or the iteration
/// cap is exhausted.
///
/// The plan document is reloaded before every selection, so progress recorded
/// by earlier iterations (or stories appended externally while the loop runs)
/// is always observed. A missing document is fatal; everything that goes
/// wrong inside one iteration is absorbed as a retryable failure and charged
/// against the cap.
pub fn run_loop<A: Agent, F: FnMut(&StoryReport)>(
    root: &Path,
    agent: &A,
    mut on_story: F,
) -> Result<LoopOutcome> {
    let plan_path = root.join(PLAN_FILE);
    if !plan_path.exists() {
        bail!("missing {} in {}", PLAN_FILE, root.display());
    }
    let config = load_config(&root.join(CONFIG_FILE))?;
    ensure_scratch_gitignore(root)?;

    let git = Git::new(root);
    if let Err(err) = git.pull_rebase() {
        warn!(err = %format!("{err:#}"), "pull --rebase failed, continuing with local history");
    }

    let mut iterations = 0u32;
    let mut recorded = 0u32;
    let mut failed = 0u32;

    loop {
        let plan = load_plan(&plan_path).context("load plan for selection")?;
        let Some(story) = next_open_story(&plan) else {
            info!(iterations, recorded, "plan complete");
            return Ok(LoopOutcome {
                iterations,
                recorded,
                failed,
                stop: LoopStop::Done,
            });
        };

        if iterations >= config.max_iterations {
            let remaining = plan.incomplete_count();
            warn!(remaining, cap = config.max_iterations, "iteration cap reached");
            return Ok(LoopOutcome {
                iterations,
                recorded,
                failed,
                stop: LoopStop::Aborted { remaining },
            });
        }
        iterations += 1;

        match run_story(root, agent, &plan, story, iterations, &config) {
            Ok(report) => {
                if report.progress_recorded {
                    recorded += 1;
                } else {
                    failed += 1;
                }
                on_story(&report);
            }
            Err(err) => {
                failed += 1;
                warn!(
                    story_id = story.id,
                    err = %format!("{err:#}"),
                    "iteration failed, story stays open"
                );
            }
        }

        if config.iteration_delay_secs > 0 {
            thread::sleep(Duration::from_secs(config.iteration_delay_secs));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CommitOutcome, InvokeFailure, InvokeOutcome};
    use crate::test_support::{
        FailingAgent, ScriptedAgent, ScriptedInvoke, TestRepo, plan_with_items, story,
    };

    #[test]
    fn completes_plan_and_reports_done() {
        let repo = TestRepo::new().expect("repo");
        repo.write_plan(&plan_with_items(vec![story(1, false), story(2, false)]))
            .expect("seed plan");

        let agent = ScriptedAgent::new(vec![
            ScriptedInvoke::success_with_file("a.txt", "a\n"),
            ScriptedInvoke::success_with_file("b.txt", "b\n"),
        ]);
        let mut seen = Vec::new();
        let outcome = run_loop(repo.root(), &agent, |report| seen.push(report.story_id))
            .expect("loop");

        assert_eq!(outcome.stop, LoopStop::Done);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.recorded, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(seen, vec![1, 2]);

        let plan = repo.read_plan().expect("reload");
        assert!(plan.items.iter().all(|s| s.passes));
    }

    #[test]
    fn empty_plan_is_done_without_iterations() {
        let repo = TestRepo::new().expect("repo");
        repo.write_plan(&plan_with_items(Vec::new())).expect("seed plan");

        let agent = ScriptedAgent::new(Vec::new());
        let outcome = run_loop(repo.root(), &agent, |_| {}).expect("loop");
        assert_eq!(outcome.stop, LoopStop::Done);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn missing_plan_is_fatal() {
        let repo = TestRepo::new().expect("repo");
        let agent = ScriptedAgent::new(Vec::new());
        let err = run_loop(repo.root(), &agent, |_| {}).unwrap_err();
        assert!(err.to_string().contains("missing prd.json"));
    }

    #[test]
    fn failing_story_consumes_the_whole_budget() {
        let repo = TestRepo::new().expect("repo");
        repo.set_max_iterations(3).expect("config");
        repo.write_plan(&plan_with_items(vec![story(1, false), story(2, false)]))
            .expect("seed plan");

        let agent = FailingAgent;
        let mut failures = 0;
        let outcome = run_loop(repo.root(), &agent, |report| {
            assert_eq!(report.story_id, 1);
            assert!(matches!(
                report.invocation,
                InvokeOutcome::Failure(InvokeFailure::NonZeroExit { .. })
            ));
            failures += 1;
        })
        .expect("loop");

        assert_eq!(outcome.stop, LoopStop::Aborted { remaining: 2 });
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.failed, 3);
        assert_eq!(failures, 3);

        let plan = repo.read_plan().expect("reload");
        assert!(!plan.items[0].passes);
        assert!(!plan.items[1].passes);
    }

    #[test]
    fn resumes_past_recorded_stories_after_abort() {
        let repo = TestRepo::new().expect("repo");
        repo.set_max_iterations(1).expect("config");
        repo.write_plan(&plan_with_items(vec![story(1, false), story(2, false)]))
            .expect("seed plan");

        let agent = ScriptedAgent::new(vec![ScriptedInvoke::success_with_file("a.txt", "a\n")]);
        let outcome = run_loop(repo.root(), &agent, |_| {}).expect("first run");
        assert_eq!(outcome.stop, LoopStop::Aborted { remaining: 1 });
        assert_eq!(outcome.recorded, 1);

        // Restarting selects only the remaining story, never story 1 again.
        let agent = ScriptedAgent::new(vec![ScriptedInvoke::success_with_file("b.txt", "b\n")]);
        let mut seen = Vec::new();
        let outcome = run_loop(repo.root(), &agent, |report| seen.push(report.story_id))
            .expect("second run");
        assert_eq!(outcome.stop, LoopStop::Done);
        assert_eq!(seen, vec![2]);
    }

    #[test]
    fn no_change_success_creates_only_plan_commit() {
        let repo = TestRepo::new().expect("repo");
        repo.write_plan(&plan_with_items(vec![story(1, false)]))
            .expect("seed plan");

        let agent = ScriptedAgent::new(vec![ScriptedInvoke::success()]);
        let mut commits = Vec::new();
        let outcome = run_loop(repo.root(), &agent, |report| commits.push(report.commit))
            .expect("loop");

        assert_eq!(outcome.stop, LoopStop::Done);
        assert_eq!(commits, vec![Some(CommitOutcome::NoChanges)]);

        let subjects = repo.log_subjects().expect("log");
        assert!(subjects.iter().any(|s| s == "chore(plan): story 1 passes"));
        assert!(!subjects.iter().any(|s| s.starts_with("feat(story-1)")));
    }
}
