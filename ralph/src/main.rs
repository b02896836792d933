//! Story-by-story agent loop runner CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ralph::core::selector::next_open_story;
use ralph::core::types::{CommitOutcome, InvokeOutcome};
use ralph::exit_codes;
use ralph::io::agent::ClaudeAgent;
use ralph::io::plan_store::{PLAN_FILE, load_plan};
use ralph::looping::{LoopStop, run_loop};
use ralph::select::{SelectOutcome, select_from_root};
use ralph::step::StoryReport;

#[derive(Parser)]
#[command(
    name = "ralph",
    version,
    about = "Resumable story-by-story agent loop runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the loop until the plan completes or the iteration cap is reached.
    Loop,
    /// Print the next open story (lowest id with passes=false).
    Select,
    /// Print plan progress counts.
    Status,
    /// Check prd.json against its schema and invariants.
    Validate,
}

fn main() {
    ralph::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Loop => cmd_loop(&root),
        Command::Select => cmd_select(&root),
        Command::Status => cmd_status(&root),
        Command::Validate => cmd_validate(&root),
    }
}

fn cmd_loop(root: &std::path::Path) -> Result<i32> {
    let agent = ClaudeAgent;
    let outcome = run_loop(root, &agent, print_story_line)?;
    match outcome.stop {
        LoopStop::Done => {
            println!(
                "done: {} stories recorded over {} iterations",
                outcome.recorded, outcome.iterations
            );
            Ok(exit_codes::OK)
        }
        LoopStop::Aborted { remaining } => {
            println!(
                "aborted: iteration cap reached, {} stories still open ({} recorded, {} failed iterations)",
                remaining, outcome.recorded, outcome.failed
            );
            Ok(exit_codes::ABORTED)
        }
    }
}

fn print_story_line(report: &StoryReport) {
    let verdict = match (&report.invocation, &report.commit) {
        (InvokeOutcome::Failure(reason), _) => format!("failed ({reason})"),
        (InvokeOutcome::Success, Some(CommitOutcome::NoChanges)) => {
            "recorded (no file changes)".to_string()
        }
        (InvokeOutcome::Success, Some(CommitOutcome::Committed { pushed: true })) => {
            "recorded (committed, pushed)".to_string()
        }
        (InvokeOutcome::Success, Some(CommitOutcome::Committed { pushed: false })) => {
            "recorded (committed, push failed)".to_string()
        }
        (InvokeOutcome::Success, None) => "recorded".to_string(),
    };
    println!(
        "iter {}: story {} \"{}\" {}",
        report.iter, report.story_id, report.title, verdict
    );
}

fn cmd_select(root: &std::path::Path) -> Result<i32> {
    match select_from_root(root)? {
        SelectOutcome::Open(selected) => {
            println!("{}\t{}", selected.id, selected.title);
            Ok(exit_codes::OK)
        }
        SelectOutcome::Complete => {
            println!("complete");
            Ok(exit_codes::COMPLETE)
        }
    }
}

fn cmd_status(root: &std::path::Path) -> Result<i32> {
    let plan = load_plan(&root.join(PLAN_FILE))?;
    let total = plan.items.len();
    let passed = total - plan.incomplete_count();
    println!("{}: {passed}/{total} stories passed", plan.title);
    if let Some(story) = next_open_story(&plan) {
        println!("next: {} \"{}\"", story.id, story.title);
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &std::path::Path) -> Result<i32> {
    let plan = load_plan(&root.join(PLAN_FILE))?;
    println!("ok: {} items", plan.items.len());
    Ok(exit_codes::OK)
}
