//! Scenario 6 (§8): a cyclic manifest aborts startup before any state write.

use crate::prelude::{Project, CYCLIC_MANIFEST};

#[test]
fn cyclic_manifest_aborts_with_exit_code_two_naming_both_ids() {
    let project = Project::empty();
    project.git_init();
    project.file("manifest.json", CYCLIC_MANIFEST);

    project
        .oj()
        .args(&["manifest.json"])
        .fails()
        .exit_code_eq(2)
        .stderr_has("a")
        .stderr_has("b");

    assert!(!project.state_path().join("state.json").exists());
}
