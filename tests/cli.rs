use assert_cmd::Command;
use predicates::prelude::*;

fn fairgate() -> Command {
    let mut cmd = Command::cargo_bin("fairgate").unwrap();
    cmd.env_remove("GITHUB_TOKEN").env_remove("FAIRGATE_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    fairgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("audit"))
        .stdout(predicate::str::contains("remediate"));
}

#[test]
fn test_status_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("store.db");

    fairgate()
        .args(["status", "--repo", "lab/tool", "--database"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("No validation records"));

    assert!(db.exists());
}

#[test]
fn test_status_json_is_an_empty_list() {
    let dir = tempfile::tempdir().unwrap();

    fairgate()
        .args(["-o", "json", "status", "--repo", "lab/tool", "--database"])
        .arg(dir.path().join("store.db"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_forget_unknown_repository() {
    let dir = tempfile::tempdir().unwrap();

    fairgate()
        .args(["forget", "--repo", "lab/tool", "--database"])
        .arg(dir.path().join("store.db"))
        .assert()
        .success()
        .stdout(predicate::str::contains("not in the store"));
}

#[test]
fn test_invalid_repository_is_rejected() {
    fairgate()
        .args(["status", "--repo", "no-slash"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("owner/name"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    fairgate()
        .args(["config", "--show", "--config"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_config_reset_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    fairgate()
        .args(["config", "--reset", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    fairgate()
        .args(["config", "--show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("fairgate[bot]"));
}
