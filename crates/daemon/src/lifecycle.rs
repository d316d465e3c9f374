// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: resolve configuration, acquire the process-level lock,
//! and load or create the persisted state document for a single run-to-completion
//! orchestration (§4.5, §6, §10.4).

use crate::env;
use fs2::FileExt;
use oj_core::SystemClock;
use oj_engine::{EngineError, Scheduler};
use oj_manifest::{CycleError, Manifest, ManifestError};
use oj_storage::{ScratchStore, StateStore, StorageError};
use oj_vcs::{GitIdentity, GitRepo};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine a state directory: set OJ_STATE_DIR or HOME")]
    NoStateDir,
    #[error("could not create state directory {path}: {source}")]
    CreateStateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not open pid file {path}: {source}")]
    OpenPidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("another orchestrator instance already holds the lock at {0}")]
    AlreadyRunning(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("--resume was given but no state document exists at {0}")]
    NothingToResume(PathBuf),
}

/// Resolved configuration for one orchestrator run, assembled from
/// `OJ_STATE_DIR` and its siblings (§10.4).
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub state_path: PathBuf,
    pub lock_path: PathBuf,
    pub scratch_root: PathBuf,
    pub workspaces_root: PathBuf,
    pub log_root: PathBuf,
    pub drop_box: PathBuf,
    pub container_image: String,
    pub compose_file: String,
    pub env_file: String,
    pub main_service: String,
    pub infra_services: Vec<String>,
    pub vcs_identity: GitIdentity,
    pub lock_timeout: Duration,
    pub parallelism: usize,
}

impl Config {
    /// Resolve configuration for a run, applying `parallelism_override` (the
    /// CLI's `--parallelism` flag) over `OJ_PARALLELISM` when given.
    pub fn load(parallelism_override: Option<usize>) -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        std::fs::create_dir_all(&state_dir)
            .map_err(|source| LifecycleError::CreateStateDir { path: state_dir.clone(), source })?;

        Ok(Self {
            state_path: state_dir.join("state.json"),
            lock_path: state_dir.join("daemon.pid"),
            scratch_root: state_dir.clone(),
            workspaces_root: state_dir.join("workspaces"),
            log_root: state_dir.join("logs"),
            drop_box: state_dir.join("edits"),
            container_image: env::container_image(),
            compose_file: env::compose_file(),
            env_file: env::env_file(),
            main_service: env::main_service(),
            infra_services: env::infra_services(),
            vcs_identity: GitIdentity { name: env::vcs_user_name(), email: env::vcs_user_email() },
            lock_timeout: env::lock_timeout(),
            parallelism: parallelism_override.unwrap_or_else(env::parallelism),
            state_dir,
        })
    }
}

/// Holds the daemon's process-wide exclusive lock for the lifetime of the run;
/// released automatically on drop.
pub struct DaemonLock {
    _file: File,
    path: PathBuf,
}

impl DaemonLock {
    /// Acquire the daemon's pid/lock file without blocking: at most one
    /// orchestrator process runs against a given state directory at a time.
    pub fn acquire(path: &Path) -> Result<Self, LifecycleError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LifecycleError::OpenPidFile { path: path.to_path_buf(), source })?;

        file.try_lock_exclusive().map_err(|_| LifecycleError::AlreadyRunning(path.to_path_buf()))?;
        file.set_len(0).map_err(|source| LifecycleError::OpenPidFile { path: path.to_path_buf(), source })?;
        let _ = write!(file, "{}", std::process::id());

        Ok(Self { _file: file, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Everything needed to build a [`Scheduler`] for one run, after the
/// dependency DAG has been validated and the state document created or
/// resumed (§4.5 Initialization).
pub struct Startup {
    pub config: Config,
    pub state: StateStore,
    pub scratch: ScratchStore,
    pub base_repo: GitRepo,
}

impl Startup {
    /// Load the manifest, validate its dependency DAG (fatal on cycle, before
    /// any state is written), and initialize or resume the state document.
    pub fn run(
        config: Config,
        manifest_path: &Path,
        repo_root: PathBuf,
        resume: bool,
    ) -> Result<(Self, oj_manifest::DependencyGraph), LifecycleError> {
        let manifest = Manifest::load(manifest_path)?;
        let state = StateStore::new(&config.state_path, config.lock_timeout);

        if resume && !state.exists() {
            return Err(LifecycleError::NothingToResume(config.state_path.clone()));
        }

        let graph = Scheduler::<oj_adapters::ProcessAgentAdapter, SystemClock>::bootstrap(
            &state,
            &manifest,
            manifest_path.to_path_buf(),
            || SystemClock.now(),
        )
        .map_err(|e| match e {
            EngineError::Cycle(cycle) => LifecycleError::Cycle(cycle),
            EngineError::Storage(storage) => LifecycleError::Storage(storage),
            other => LifecycleError::Storage(StorageError::Rejected(other.to_string())),
        })?;

        let scratch = ScratchStore::new(&config.scratch_root);
        let base_repo = GitRepo::new(repo_root);

        Ok((Self { config, state, scratch, base_repo }, graph))
    }
}
