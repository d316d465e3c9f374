//! `oj --help` / `oj --version` output.

use crate::prelude::cli;

#[test]
fn help_lists_every_flag() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("oj")
        .stdout_has("--parallelism")
        .stdout_has("--resume")
        .stdout_has("--build")
        .stdout_has("--repo");
}

#[test]
fn version_prints_something_nonempty() {
    cli().args(&["--version"]).passes().stdout_has("oj");
}

#[test]
fn missing_positional_argument_fails_with_usage() {
    cli().args(&[]).fails().stderr_has("Usage");
}
