// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Odd Jobs orchestrator daemon (`ojd`).
//!
//! Runs one manifest to completion: validates its dependency DAG, assigns
//! stories to a bounded pool of agent workers, drives each to completion or
//! failure, and exits once every story is terminal or permanently blocked.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use oj_daemon::{rotate_log_if_needed, setup_logging, orchestrate, Config, RunError, RunRequest};
use oj_engine::SchedulerOutcome;
use std::path::PathBuf;

struct Args {
    manifest_path: PathBuf,
    repo_root: PathBuf,
    parallelism: Option<usize>,
    resume: bool,
    build: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut manifest_path = None;
    let mut repo_root = std::env::current_dir().map_err(|e| e.to_string())?;
    let mut parallelism = None;
    let mut resume = false;
    let mut build = false;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("ojd {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--resume" => resume = true,
            "--build" => build = true,
            "--parallelism" => {
                let value = iter.next().ok_or("--parallelism requires a value")?;
                parallelism = Some(value.parse::<usize>().map_err(|e| e.to_string())?);
            }
            "--repo" => {
                let value = iter.next().ok_or("--repo requires a value")?;
                repo_root = PathBuf::from(value);
            }
            other if manifest_path.is_none() => manifest_path = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    Ok(Args {
        manifest_path: manifest_path.ok_or("missing required manifest path argument")?,
        repo_root,
        parallelism,
        resume,
        build,
    })
}

fn print_help() {
    println!("ojd {}", env!("CARGO_PKG_VERSION"));
    println!("Odd Jobs orchestrator daemon");
    println!();
    println!("USAGE:");
    println!("    ojd [OPTIONS] <MANIFEST>");
    println!();
    println!("OPTIONS:");
    println!("    --repo <PATH>            Source repository root (default: current directory)");
    println!("    --parallelism <N>        Worker-slot count (default: OJ_PARALLELISM, or 1)");
    println!("    --resume                 Load existing state instead of creating a fresh run");
    println!("    --build                  Force a fresh agent image build before the first step");
    println!("    -h, --help               Print help information");
    println!("    -V, --version            Print version information");
}

#[tokio::main]
async fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("Usage: ojd [OPTIONS] <MANIFEST>");
            std::process::exit(2);
        }
    };

    match run(args).await {
        Ok(SchedulerOutcome::AllTerminal) => std::process::exit(0),
        Ok(SchedulerOutcome::SomeBlocked) => std::process::exit(1),
        Err(RunError::Config(e)) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
        Err(RunError::Engine(e)) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<SchedulerOutcome, RunError> {
    let config = Config::load(args.parallelism)?;
    rotate_log_if_needed(&config.log_root.join("ojd.log"));
    let _log_guard = setup_logging(&config, "ojd.log")?;

    orchestrate(RunRequest {
        config,
        manifest_path: args.manifest_path,
        repo_root: args.repo_root,
        resume: args.resume,
        build: args.build,
    })
    .await
}
