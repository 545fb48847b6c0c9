//! Black-box tests against the `azcopy` binary itself.
//!
//! `conserve::tests::cli` builds the release binary once via `escargot` and
//! shares it across tests with `lazy_static`; neither crate is part of this
//! workspace's dependencies, so here `assert_cmd::Command::cargo_bin` is used
//! instead, which builds/finds the binary without an extra dependency.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn list_prints_one_line_per_entry_and_exits_zero() {
    let dir = TempDir::new().unwrap();
    dir.child("a.txt").write_str("x").unwrap();
    dir.child("sub/b.txt").write_str("y").unwrap();

    Command::cargo_bin("azcopy")
        .unwrap()
        .arg("list")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt"))
        .stdout(predicate::str::contains("sub/b.txt"));
}

#[test]
fn copy_with_no_matching_entries_fails_with_nothing_scheduled() {
    let source = TempDir::new().unwrap();
    let destination = TempDir::new().unwrap();

    Command::cargo_bin("azcopy")
        .unwrap()
        .arg("copy")
        .arg(source.path())
        .arg(destination.path())
        .arg("--recursive")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nothing to do"));
}

#[test]
fn copy_of_a_real_file_succeeds() {
    let source = TempDir::new().unwrap();
    source.child("payload.bin").write_str("hello world").unwrap();
    let destination = TempDir::new().unwrap();

    Command::cargo_bin("azcopy")
        .unwrap()
        .arg("copy")
        .arg(source.path())
        .arg(destination.path())
        .arg("--recursive")
        .assert()
        .success();
}

#[test]
fn remove_with_zero_matches_exits_one() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("azcopy")
        .unwrap()
        .arg("remove")
        .arg(dir.path())
        .arg("--recursive")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn a_wildcard_in_a_local_path_is_rejected_as_a_bad_url() {
    Command::cargo_bin("azcopy")
        .unwrap()
        .arg("copy")
        .arg("/tmp/*/missing")
        .arg("/tmp/dest")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn a_service_level_source_without_recursive_is_rejected() {
    Command::cargo_bin("azcopy")
        .unwrap()
        .arg("copy")
        .arg("https://acct.blob.core.windows.net/")
        .arg("/tmp/dest")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("requires --recursive"));
}

#[test]
fn missing_required_arguments_is_a_clap_usage_error() {
    Command::cargo_bin("azcopy").unwrap().arg("copy").assert().failure().code(2);
}

#[test]
fn cp_and_rm_aliases_are_accepted() {
    let dir = TempDir::new().unwrap();
    dir.child("a.txt").write_str("x").unwrap();
    let destination = TempDir::new().unwrap();

    Command::cargo_bin("azcopy")
        .unwrap()
        .arg("cp")
        .arg(dir.path())
        .arg(destination.path())
        .arg("--recursive")
        .assert()
        .success();
}
