//! End-to-end CLI tests for the qurancom-dl binary.
//!
//! Every invocation points `XDG_CONFIG_HOME` at a scratch directory so a
//! developer's own config file never leaks into the assertions, and only
//! `--dry-run` paths are exercised so nothing touches the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn qurancom_dl(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("qurancom-dl").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let config_home = TempDir::new().unwrap();
    qurancom_dl(&config_home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--clear-cache"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_binary_version_displays_name() {
    let config_home = TempDir::new().unwrap();
    qurancom_dl(&config_home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qurancom-dl"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let config_home = TempDir::new().unwrap();
    qurancom_dl(&config_home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_dry_run_lists_pending_resources_without_writing() {
    let config_home = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let out = dst.path().join("out");

    qurancom_dl(&config_home)
        .args(["--dry-run", "-q", "--languages", "en", "-d"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("catalog: 1323  cached: 0  pending: 1323"))
        .stdout(predicate::str::contains("chapters-en.json"))
        .stdout(predicate::str::contains("word-text-604.json"));

    assert!(!out.exists(), "dry run must not create the destination");
}

#[test]
fn test_dry_run_counts_cached_entries() {
    let config_home = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let cache = dst.path().join(".cache/qurancom");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(cache.join("chapters-en.json"), b"{}").unwrap();

    qurancom_dl(&config_home)
        .args(["--dry-run", "-q", "--languages", "en", "-d"])
        .arg(dst.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("cached: 1  pending: 1322"))
        .stdout(predicate::str::contains("chapters-en.json").not());
}

#[test]
fn test_unknown_language_exits_with_failure() {
    let config_home = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();

    qurancom_dl(&config_home)
        .args(["--dry-run", "--languages", "xx", "-d"])
        .arg(dst.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("xx"));
}

#[test]
fn test_config_file_values_apply_below_cli_flags() {
    let config_home = TempDir::new().unwrap();
    let app_dir = config_home.path().join("qurancom-dl");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(
        app_dir.join("config.toml"),
        "languages = \"id\"\nconcurrency = 4\n",
    )
    .unwrap();
    let dst = TempDir::new().unwrap();

    qurancom_dl(&config_home)
        .args(["--dry-run", "-q", "-d"])
        .arg(dst.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("chapters-id.json"))
        .stdout(predicate::str::contains("chapters-en.json").not());

    qurancom_dl(&config_home)
        .args(["--dry-run", "-q", "--languages", "en", "-d"])
        .arg(dst.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("chapters-en.json"))
        .stdout(predicate::str::contains("chapters-id.json").not());
}

#[test]
fn test_malformed_config_file_is_reported() {
    let config_home = TempDir::new().unwrap();
    let app_dir = config_home.path().join("qurancom-dl");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(app_dir.join("config.toml"), "unknown_key = 1\n").unwrap();

    qurancom_dl(&config_home)
        .arg("--dry-run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config.toml"));
}
