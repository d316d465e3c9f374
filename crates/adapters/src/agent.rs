// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent adapter: spawns the external coding-agent process for one step
//! and runs it to completion, bounded by the step kind's timeout (§4.3 steps
//! 3-4).

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to spawn agent process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to write prompt to agent stdin: {0}")]
    Stdin(#[source] std::io::Error),
    #[error("failed to capture agent output: {0}")]
    Io(#[source] std::io::Error),
}

/// Everything the adapter needs to run one step's agent invocation.
#[derive(Debug, Clone)]
pub struct AgentSpawnConfig {
    /// Shell command used to invoke the agent (e.g. the configured coding-agent binary).
    pub command: String,
    pub env: Vec<(String, String)>,
    pub workspace_path: PathBuf,
    /// The composed prompt (§4.3 step 2).
    pub prompt: String,
    /// Where the full event stream is captured, keyed by story/step (§6 "Logs").
    pub log_path: PathBuf,
}

/// How an agent invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentExitStatus {
    Success,
    Failure { message: String },
    TimedOut,
}

/// Everything collected from one agent invocation (§4.3 step 4).
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub exit: AgentExitStatus,
    /// The agent's structured summary, by convention the last section of its output.
    pub summary: String,
    pub tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub log_path: PathBuf,
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        self.exit == AgentExitStatus::Success
    }
}

/// Adapter for invoking the external coding agent.
#[async_trait]
pub trait AgentAdapter: Clone + Send + Sync + 'static {
    /// Run the agent with `config.prompt`, bounded by `timeout`. Never
    /// returns `Err` for an agent-side failure or timeout — those are
    /// reported via `AgentOutcome::exit`. `Err` is reserved for adapter-level
    /// failures to even launch the process.
    async fn run(&self, config: AgentSpawnConfig, timeout: Duration) -> Result<AgentOutcome, AgentError>;
}

/// Parse the trailing structured-result record out of a JSONL session log,
/// the convention coding-agent CLIs use for a final `{"type":"result",...}`
/// line carrying the summary, token, and cost counters.
pub fn parse_summary(raw_stdout: &str) -> (String, Option<u64>, Option<f64>) {
    for line in raw_stdout.lines().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) else { continue };
        if json.get("type").and_then(|v| v.as_str()) != Some("result") {
            continue;
        }
        let summary = json
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let tokens = json
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(|t| t.as_u64());
        let cost_usd = json.get("total_cost_usd").and_then(|c| c.as_f64());
        return (summary, tokens, cost_usd);
    }

    // No structured result record: fall back to the last non-empty line (§4.3
    // step 4's "by convention").
    let summary = raw_stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string();
    (summary, None, None)
}

/// Spawns the real agent subprocess via `tokio::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct ProcessAgentAdapter;

#[async_trait]
impl AgentAdapter for ProcessAgentAdapter {
    async fn run(&self, config: AgentSpawnConfig, timeout: Duration) -> Result<AgentOutcome, AgentError> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;
        use tokio::process::Command;

        if let Some(parent) = config.log_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(AgentError::Io)?;
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&config.command)
            .current_dir(&config.workspace_path)
            .envs(config.env.iter().cloned().collect::<HashMap<_, _>>())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // On timeout, the `tokio::time::timeout` below drops the future
            // holding `child`; without this, the subprocess would be
            // orphaned instead of killed (§5 "on expiry the orchestrator
            // kills the agent subprocess").
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(AgentError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(config.prompt.as_bytes()).await.map_err(AgentError::Stdin)?;
        }

        let run = async {
            let output = child.wait_with_output().await.map_err(AgentError::Io)?;
            Ok::<_, AgentError>(output)
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                tokio::fs::write(&config.log_path, format!("{stdout}\n{stderr}"))
                    .await
                    .map_err(AgentError::Io)?;

                let (summary, tokens, cost_usd) = parse_summary(&stdout);
                let exit = if output.status.success() {
                    AgentExitStatus::Success
                } else {
                    AgentExitStatus::Failure {
                        message: format!(
                            "agent exited with status {}: {}",
                            output.status.code().unwrap_or(-1),
                            stderr.trim()
                        ),
                    }
                };

                Ok(AgentOutcome { exit, summary, tokens, cost_usd, log_path: config.log_path })
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Ok(AgentOutcome {
                exit: AgentExitStatus::TimedOut,
                summary: String::new(),
                tokens: None,
                cost_usd: None,
                log_path: config.log_path,
            }),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{AgentCall, FakeAgentAdapter};
