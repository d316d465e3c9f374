// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared orchestration entry point: validates a manifest, acquires the
//! daemon lock, and drives the scheduler to completion. Used by both the
//! `ojd` binary and the `oj` CLI, which starts the orchestrator in-process
//! rather than talking to a long-running daemon (§10.1, §10.6).

use crate::lifecycle::{Config, DaemonLock, LifecycleError, Startup};
use oj_adapters::ProcessAgentAdapter;
use oj_core::SystemClock;
use oj_engine::{Scheduler, SchedulerOutcome};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

/// Everything needed to orchestrate one manifest to completion.
pub struct RunRequest {
    pub config: Config,
    pub manifest_path: PathBuf,
    pub repo_root: PathBuf,
    pub resume: bool,
    /// `--build`: force a fresh image build before the first agent launch,
    /// passed through opaquely to the agent-backend launch configuration.
    pub build: bool,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] LifecycleError),
    #[error(transparent)]
    Engine(#[from] oj_engine::EngineError),
}

/// Validate and run one manifest to completion, returning the scheduler's
/// terminal outcome. Acquires the state directory's lock for the duration
/// of the run; releases it on return.
pub async fn orchestrate(request: RunRequest) -> Result<SchedulerOutcome, RunError> {
    info!(manifest = %request.manifest_path.display(), resume = request.resume, "starting orchestrator");

    let _lock = DaemonLock::acquire(&request.config.lock_path)?;

    let (startup, graph) =
        Startup::run(request.config, &request.manifest_path, request.repo_root, request.resume)?;

    let mut executor_env = vec![
        ("OJ_CONTAINER_IMAGE".to_string(), startup.config.container_image.clone()),
        ("OJ_COMPOSE_FILE".to_string(), startup.config.compose_file.clone()),
        ("OJ_ENV_FILE".to_string(), startup.config.env_file.clone()),
        ("OJ_MAIN_SERVICE".to_string(), startup.config.main_service.clone()),
        ("OJ_INFRA_SERVICES".to_string(), startup.config.infra_services.join(",")),
    ];
    if request.build {
        executor_env.push(("OJ_BUILD".to_string(), "1".to_string()));
    }

    let workspaces_root = startup.config.workspaces_root.clone();
    let log_root = startup.config.log_root.clone();
    let drop_box = startup.config.drop_box.clone();
    let parallelism = startup.config.parallelism;

    let workspaces =
        oj_engine::WorkspaceManager::new(startup.base_repo, workspaces_root, startup.config.vcs_identity.clone());
    let executor = oj_engine::StepExecutor::new(
        ProcessAgentAdapter,
        SystemClock,
        startup.scratch.clone(),
        "oj-agent-run",
        executor_env,
        log_root,
        drop_box,
    );

    let scheduler =
        Scheduler::new(startup.state, startup.scratch, workspaces, executor, SystemClock, graph, parallelism);

    let summary = scheduler.run().await?;
    info!(completed = summary.completed, failed = summary.failed, blocked = summary.blocked, "orchestrator run finished");

    match summary.outcome {
        Some(outcome) => Ok(outcome),
        None => {
            error!("scheduler returned no outcome");
            Ok(SchedulerOutcome::SomeBlocked)
        }
    }
}

/// Rotate a log file once it exceeds a fixed 10 MiB threshold rather than
/// on a time-based schedule.
pub fn rotate_log_if_needed(log_path: &std::path::Path) {
    const MAX_BYTES: u64 = 10 * 1024 * 1024;
    let Ok(metadata) = std::fs::metadata(log_path) else { return };
    if metadata.len() > MAX_BYTES {
        let rotated = log_path.with_extension("log.old");
        let _ = std::fs::rename(log_path, rotated);
    }
}

/// Install a rolling file-backed `tracing` subscriber under `config.log_root`.
/// Returns the non-blocking writer's guard, which must be held for the
/// lifetime of the process.
pub fn setup_logging(
    config: &Config,
    file_name: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.log_root)
        .map_err(|source| LifecycleError::CreateStateDir { path: config.log_root.clone(), source })?;

    let file_appender = tracing_appender::rolling::never(&config.log_root, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
