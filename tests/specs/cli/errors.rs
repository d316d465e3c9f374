//! CLI-surface error handling that never reaches the scheduler.

use crate::prelude::Project;

#[test]
fn malformed_manifest_file_fails_with_exit_code_two() {
    let project = Project::empty();
    project.git_init();
    project.file("manifest.json", "{not json");

    project.oj().args(&["manifest.json"]).fails().exit_code_eq(2);
}

#[test]
fn empty_manifest_fails_with_exit_code_two() {
    let project = Project::empty();
    project.git_init();
    project.file("manifest.json", r#"{"stories":[]}"#);

    project.oj().args(&["manifest.json"]).fails().exit_code_eq(2).stderr_has("empty");
}

#[test]
fn resume_without_a_prior_run_fails_with_exit_code_two() {
    let project = Project::empty();
    project.git_init();
    project.file("manifest.json", r#"{"stories":[{"id":"a","title":"A"}]}"#);

    project.oj().args(&["manifest.json", "--resume"]).fails().exit_code_eq(2).stderr_has("resume");
}
