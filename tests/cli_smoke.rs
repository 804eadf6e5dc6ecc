//! Smoke tests for the `ocimachine` binary surface.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_lifecycle_subcommands() {
    Command::cargo_bin("ocimachine")
        .expect("binary should build")
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("create")
                .and(predicate::str::contains("start"))
                .and(predicate::str::contains("stop"))
                .and(predicate::str::contains("restart"))
                .and(predicate::str::contains("rm"))
                .and(predicate::str::contains("url")),
        );
}

#[test]
fn running_without_arguments_shows_help() {
    Command::cargo_bin("ocimachine")
        .expect("binary should build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
