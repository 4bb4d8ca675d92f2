use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn stackup(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("stackup").unwrap();
    cmd.current_dir(dir)
        .env_remove("STACKUP_CONFIG_PATH")
        .env_remove("STACKUP_REGION")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// CLI help lists every command
#[test]
fn test_cli_help() {
    let temp_dir = tempfile::tempdir().unwrap();
    stackup(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("names"));
}

#[test]
fn test_cli_version() {
    let temp_dir = tempfile::tempdir().unwrap();
    stackup(temp_dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("stackup "));
}

#[test]
fn test_up_help_lists_flags() {
    let temp_dir = tempfile::tempdir().unwrap();
    stackup(temp_dir.path())
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_invalid_command() {
    let temp_dir = tempfile::tempdir().unwrap();
    stackup(temp_dir.path())
        .arg("invalid-command")
        .assert()
        .failure();
}

#[test]
fn test_plan_prints_steps() {
    let temp_dir = tempfile::tempdir().unwrap();
    stackup(temp_dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("resource-group"))
        .stdout(predicate::str::contains("firewall-allow-caller"))
        .stdout(predicate::str::contains("(optional)"))
        .stdout(predicate::str::contains("Plan is valid (11 steps)"));
}

#[test]
fn test_names_with_fixed_seed() {
    let temp_dir = tempfile::tempdir().unwrap();
    stackup(temp_dir.path())
        .args(["names", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlserver-0000000000007"))
        .stdout(predicate::str::contains("acr0000000000007"));
}

#[test]
fn test_config_file_is_picked_up() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("stackup.yaml"),
        "services: [orders]\n",
    )
    .unwrap();

    stackup(temp_dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("app-orders"))
        .stdout(predicate::str::contains("stackup.yaml"));
}

#[test]
fn test_invalid_config_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("stackup.yaml"), "services: []\n").unwrap();

    stackup(temp_dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one service"));
}

#[test]
fn test_dry_run_writes_output_and_report() {
    let temp_dir = tempfile::tempdir().unwrap();

    stackup(temp_dir.path())
        .args(["up", "--dry-run", "--output", "out/deployment.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/11]"))
        .stdout(predicate::str::contains("[11/11]"))
        .stdout(predicate::str::contains("done"));

    let artifact = fs::read_to_string(temp_dir.path().join("out/deployment.txt")).unwrap();
    assert!(artifact.starts_with("STATUS=completed\n"));
    for key in [
        "RESOURCE_GROUP=",
        "SQL_SERVER=",
        "SQL_DB=",
        "ACR_NAME=",
        "USER_SERVICE_URL=",
        "PRODUCT_SERVICE_URL=",
        "CONNECTION_STRING=",
    ] {
        assert!(artifact.contains(key), "missing {}", key);
    }

    let report = fs::read_to_string(temp_dir.path().join(".stackup/last-run.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["provider"], "mock");
    assert_eq!(report["context"]["status"], "completed");
}

#[test]
fn test_failed_step_aborts_with_partial_output() {
    let temp_dir = tempfile::tempdir().unwrap();

    stackup(temp_dir.path())
        .args(["up", "--dry-run", "--fail-step", "sql-db", "--output", "out.txt"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("[2/11] Creating SQL server... done"))
        .stdout(predicate::str::contains("[3/11] Creating SQL database... failed"))
        .stdout(predicate::str::contains("[4/11]").not())
        .stdout(predicate::str::contains("Run aborted"));

    let artifact = fs::read_to_string(temp_dir.path().join("out.txt")).unwrap();
    assert!(artifact.starts_with("STATUS=aborted\n"));
    assert!(artifact.contains("\nRESOURCE_GROUP="));
    assert!(artifact.contains("\nSQL_SERVER="));
    for line in artifact.lines().skip(2) {
        let (key, _) = line.split_once('=').unwrap();
        assert!(
            key == "LOCATION" || key.starts_with("RESOURCE_GROUP") || key.starts_with("SQL_SERVER"),
            "unexpected key {}",
            key
        );
    }

    let report = fs::read_to_string(temp_dir.path().join(".stackup/last-run.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["context"]["status"], "aborted");
    assert!(report["error"].as_str().unwrap().contains("sql-db"));
}

#[test]
fn test_fail_step_requires_dry_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    stackup(temp_dir.path())
        .args(["up", "--fail-step", "sql-db"])
        .assert()
        .failure()
        .code(2);
}
