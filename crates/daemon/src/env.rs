// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate (§10.4).

use crate::lifecycle::LifecycleError;
use std::path::PathBuf;
use std::time::Duration;

/// Resolve the state directory: `OJ_STATE_DIR` > `XDG_STATE_HOME`/oj > `~/.local/state/oj`.
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("OJ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("oj"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/oj"))
}

/// Container image used to launch the coding agent (default `oj-agent:latest`).
pub fn container_image() -> String {
    std::env::var("OJ_CONTAINER_IMAGE").unwrap_or_else(|_| "oj-agent:latest".to_string())
}

/// Compose file for the agent/infra stack (default `docker-compose.yml`).
pub fn compose_file() -> String {
    std::env::var("OJ_COMPOSE_FILE").unwrap_or_else(|_| "docker-compose.yml".to_string())
}

/// Env file passed through to the compose stack (default `.env`).
pub fn env_file() -> String {
    std::env::var("OJ_ENV_FILE").unwrap_or_else(|_| ".env".to_string())
}

/// Compose service running the agent (default `app`).
pub fn main_service() -> String {
    std::env::var("OJ_MAIN_SERVICE").unwrap_or_else(|_| "app".to_string())
}

/// Comma-separated auxiliary compose services to bring up alongside the
/// main service (default empty).
pub fn infra_services() -> Vec<String> {
    std::env::var("OJ_INFRA_SERVICES")
        .ok()
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Identity used for integration commits (default `"oj-bot"`).
pub fn vcs_user_name() -> String {
    std::env::var("OJ_VCS_USER_NAME").unwrap_or_else(|_| "oj-bot".to_string())
}

/// Identity used for integration commits (default `"oj-bot@localhost"`).
pub fn vcs_user_email() -> String {
    std::env::var("OJ_VCS_USER_EMAIL").unwrap_or_else(|_| "oj-bot@localhost".to_string())
}

/// Bounded lock-acquisition timeout for the state document (§4.8; default 60000ms).
pub fn lock_timeout() -> Duration {
    let ms = std::env::var("OJ_LOCK_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60_000);
    Duration::from_millis(ms)
}

/// Default worker-slot count when not given on the CLI (default 1).
pub fn parallelism() -> usize {
    std::env::var("OJ_PARALLELISM")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1)
}
