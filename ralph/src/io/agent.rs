//! Agent abstraction for story implementation.
//!
//! The [`Agent`] trait decouples loop orchestration from the actual backend
//! (currently the `claude` CLI). Tests use scripted agents that return
//! predetermined outcomes without spawning processes. The agent's side
//! effects on the working tree are opaque here; only the completion signal
//! is observed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{InvokeFailure, InvokeOutcome};
use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Working directory the agent reads and writes.
    pub workdir: PathBuf,
    /// Rendered instruction payload fed to the agent.
    pub prompt: String,
    /// Path to write the agent stdout/stderr transcript.
    pub agent_log_path: PathBuf,
    /// Maximum time to wait for the agent to complete.
    pub timeout: Duration,
    /// Truncate captured agent output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over agent execution backends.
pub trait Agent {
    /// Run the agent with the given request. Failures (non-zero exit,
    /// timeout, transport) are returned as data, not errors; `Err` is
    /// reserved for faults in the invoker's own bookkeeping.
    fn invoke(&self, request: &InvokeRequest) -> Result<InvokeOutcome>;
}

/// Agent that spawns the `claude` CLI.
pub struct ClaudeAgent;

impl Agent for ClaudeAgent {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn invoke(&self, request: &InvokeRequest) -> Result<InvokeOutcome> {
        info!(workdir = %request.workdir.display(), "starting claude invocation");

        let mut cmd = Command::new("claude");
        cmd.arg("-p")
            .arg("--dangerously-skip-permissions")
            .arg("--output-format")
            .arg("text")
            .current_dir(&request.workdir);

        let output = match run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        ) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "could not drive claude process");
                return Ok(InvokeOutcome::Failure(InvokeFailure::Transport {
                    detail: format!("{err:#}"),
                }));
            }
        };

        write_agent_log(&request.agent_log_path, &output)?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "claude invocation timed out"
            );
            return Ok(InvokeOutcome::Failure(InvokeFailure::TimedOut {
                timeout_secs: request.timeout.as_secs(),
            }));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "claude invocation failed");
            return Ok(InvokeOutcome::Failure(InvokeFailure::NonZeroExit {
                code: output.status.code(),
            }));
        }

        debug!("claude invocation completed");
        Ok(InvokeOutcome::Success)
    }
}

fn write_agent_log(path: &Path, output: &CommandOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create agent log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("agent"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("agent"));
    if output.timed_out {
        buf.push_str("\n[agent timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write agent log {}", path.display()))
}
