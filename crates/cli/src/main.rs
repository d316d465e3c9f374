// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! oj - Odd Jobs CLI
//!
//! A single entry point that starts the orchestrator in-process against
//! either a manifest file or a free-form one-shot request, which is
//! expanded into a single-story ad-hoc manifest before the same code path
//! runs it (§6, §10.6).

mod exit_error;

use anyhow::{Context, Result};
use clap::Parser;
use exit_error::ExitError;
use oj_daemon::{orchestrate, rotate_log_if_needed, setup_logging, Config, RunError, RunRequest};
use oj_engine::SchedulerOutcome;
use oj_manifest::{Manifest, StoryEntry};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "oj",
    version,
    about = "Odd Jobs - an automated team for your odd jobs"
)]
struct Cli {
    /// A free-form one-shot request, or a path to a manifest file (JSON or TOML)
    request_or_manifest: String,

    /// Worker-slot count (default: OJ_PARALLELISM, or 1)
    #[arg(long)]
    parallelism: Option<usize>,

    /// Load the existing state document instead of starting a fresh run
    #[arg(long)]
    resume: bool,

    /// Force a fresh agent image build before the first step
    #[arg(long)]
    build: bool,

    /// Source repository root (default: current directory)
    #[arg(short = 'C', long = "repo", value_name = "DIR")]
    repo: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(SchedulerOutcome::AllTerminal) => std::process::exit(0),
        Ok(SchedulerOutcome::SomeBlocked) => std::process::exit(1),
        Err(e) => {
            let code = e.downcast_ref::<ExitError>().map_or(1, |c| c.code);
            eprintln!("error: {e}");
            std::process::exit(code);
        }
    }
}

async fn run() -> Result<SchedulerOutcome> {
    let cli = Cli::parse();

    let config = load_config(cli.parallelism)?;
    rotate_log_if_needed(&config.log_root.join("oj.log"));
    let _log_guard = setup_logging(&config, "oj.log")
        .map_err(|e| ExitError::new(2, e.to_string()))
        .context("setting up logging")?;

    let repo_root = match cli.repo {
        Some(dir) => dir,
        None => std::env::current_dir()
            .map_err(|e| ExitError::new(2, format!("could not determine current directory: {e}")))?,
    };

    let manifest_path = resolve_manifest_path(&cli.request_or_manifest, &config)?;

    let outcome =
        orchestrate(RunRequest { config, manifest_path, repo_root, resume: cli.resume, build: cli.build })
            .await
            .map_err(classify_run_error)?;

    Ok(outcome)
}

fn load_config(parallelism: Option<usize>) -> Result<Config> {
    Config::load(parallelism).map_err(|e| ExitError::new(2, e.to_string()).into())
}

/// A cyclic or otherwise malformed manifest is a configuration error (exit 2);
/// anything else that surfaces from the scheduler is an unrecoverable
/// orchestrator failure (exit 1, the default for an undowncastable error).
fn classify_run_error(err: RunError) -> anyhow::Error {
    match err {
        RunError::Config(e) => ExitError::new(2, e.to_string()).into(),
        RunError::Engine(e) => anyhow::Error::new(e),
    }
}

/// If `request_or_manifest` names an existing file, treat it as a manifest
/// path directly. Otherwise, treat it as a free-form one-shot request and
/// expand it into a single-story ad-hoc manifest written under the state
/// directory.
fn resolve_manifest_path(request_or_manifest: &str, config: &Config) -> Result<PathBuf> {
    let candidate = Path::new(request_or_manifest);
    if candidate.is_file() {
        return Ok(candidate.to_path_buf());
    }

    write_adhoc_manifest(request_or_manifest, config)
}

fn write_adhoc_manifest(request: &str, config: &Config) -> Result<PathBuf> {
    let title: String = request.chars().take(72).collect();
    let manifest = Manifest {
        stories: vec![StoryEntry {
            id: "adhoc".to_string(),
            title,
            description: request.to_string(),
            acceptance_criteria: Vec::new(),
            priority: None,
            passes: None,
            notes: None,
            depends_on: Vec::new(),
        }],
    };

    let path = config.state_dir.join("adhoc-manifest.json");
    let contents = serde_json::to_string_pretty(&manifest).context("encoding ad-hoc manifest")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("writing ad-hoc manifest to {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
