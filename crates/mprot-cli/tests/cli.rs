//! End-to-end runs of the `mprot` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../mprot-loader/tests/fixtures")
        .join(name)
}

fn mprot(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mprot").unwrap();
    cmd.env("MPROT_CONFIG", config_dir.join("config.toml"))
        .env("RUST_LOG", "off");
    cmd
}

fn relaxed_plan(dir: &Path) -> PathBuf {
    let text = std::fs::read_to_string(fixture("migrate.json")).unwrap();
    let path = dir.join("relaxed.json");
    std::fs::write(
        &path,
        text.replace(
            r#"{ "before": "db2-up", "after": "retire-db1" }"#,
            r#"{ "before": "deploy-db2", "after": "retire-db1" }"#,
        ),
    )
    .unwrap();
    path
}

#[test]
fn valid_plan_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    mprot(dir.path())
        .arg("analyze")
        .arg("--app")
        .arg(fixture("stack.json"))
        .arg("--plan")
        .arg(fixture("migrate.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("plan is strictly valid"));
}

#[test]
fn invalid_plan_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let plan = relaxed_plan(dir.path());

    mprot(dir.path())
        .args(["analyze", "--strict", "--app"])
        .arg(fixture("stack.json"))
        .arg("--plan")
        .arg(&plan)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("plan is not strictly valid"))
        .stdout(predicate::str::contains("web-up"));

    mprot(dir.path())
        .args(["analyze", "--weak", "--app"])
        .arg(fixture("stack.json"))
        .arg("--plan")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("plan is weakly valid"));
}

#[test]
fn configured_validity_and_json_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "default_validity = \"weak\"\noutput = \"json\"\n",
    )
    .unwrap();
    let plan = relaxed_plan(dir.path());

    let assert = mprot(dir.path())
        .arg("analyze")
        .arg("--app")
        .arg(fixture("stack.json"))
        .arg("--plan")
        .arg(&plan)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["validity"], "weak");
    assert_eq!(json["valid"], true);
    assert_eq!(json["elements"], 7);
}

#[test]
fn load_errors_exit_two() {
    let dir = tempfile::tempdir().unwrap();
    mprot(dir.path())
        .arg("analyze")
        .arg("--app")
        .arg(dir.path().join("missing.json"))
        .arg("--plan")
        .arg(fixture("migrate.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Cannot read"));
}

#[test]
fn misuse_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let plan = dir.path().join("unmatched.json");
    std::fs::write(
        &plan,
        r#"{"elements": {"end": {"type": "op_end", "instance": "db1", "op": "stop"}}}"#,
    )
    .unwrap();

    mprot(dir.path())
        .arg("analyze")
        .arg("--app")
        .arg(fixture("stack.json"))
        .arg("--plan")
        .arg(&plan)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Analysis error"));
}

#[test]
fn inspect_lists_instances() {
    let dir = tempfile::tempdir().unwrap();
    mprot(dir.path())
        .arg("inspect")
        .arg("--app")
        .arg(fixture("stack.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("db1"))
        .stdout(predicate::str::contains("host=vm1"));
}
