//! Integration tests for the celcache CLI.

use std::process::Command;

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use tempfile::TempDir;

fn celcache_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_celcache"))
}

fn celcache() -> AssertCommand {
    AssertCommand::cargo_bin("celcache").expect("binary exists")
}

#[test]
fn test_version_command() {
    let output = celcache_bin()
        .arg("version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("celcache"));
    assert!(stdout.contains("extensions v2"));
}

#[test]
fn test_help_command() {
    let output = celcache_bin()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["eval", "eval-json", "check", "stats", "bench", "serve", "init"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_eval_json_prints_value() {
    celcache()
        .args(["eval-json", "age >= 18.0", r#"{"age": 30}"#])
        .assert()
        .success()
        .stdout("true\n");
}

#[test]
fn test_eval_json_fast_path() {
    celcache()
        .args(["eval-json", "user.name", r#"{"user": {"name": "Jane"}}"#])
        .assert()
        .success()
        .stdout("Jane\n");
}

#[test]
fn test_eval_payload() {
    celcache()
        .args(["eval", "len(data)", "hello"])
        .assert()
        .success()
        .stdout("5\n");
}

#[test]
fn test_eval_json_error_fails() {
    celcache()
        .args(["-q", "eval-json", "1 +", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: CEL compilation error"));
}

#[test]
fn test_check_command() {
    celcache()
        .args(["check", "1 + 1"])
        .assert()
        .success()
        .stdout("OK\n");

    celcache()
        .args(["check", "price > 10.0"])
        .assert()
        .success()
        .stdout("OK (with variable declarations)\n");

    celcache().args(["-q", "check", "1 +"]).assert().failure();
}

#[test]
fn test_stats_command() {
    celcache()
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("program_hits").and(predicate::str::contains("memory_usage")));
}

#[test]
fn test_bench_command() {
    celcache()
        .args(["bench", "a * 2.0", r#"{"a": 21}"#, "-n", "20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Iterations:        20"))
        .stdout(predicate::str::contains("Cached program:    19"));
}

#[test]
fn test_serve_over_stdin() {
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"eval_json","params":{"expression":"1 + 1"}}"#,
        "\n"
    );
    celcache()
        .args(["-q", "serve"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""value":"2""#));
}

#[test]
fn test_init_creates_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("celcache.toml");

    let output = celcache_bin()
        .arg("init")
        .arg("--path")
        .arg(temp_dir.path())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "init command failed");
    assert!(config_path.exists(), "Config file was not created");

    let content = std::fs::read_to_string(&config_path).expect("Failed to read config");
    assert!(content.contains("[general]"));
    assert!(content.contains("[cache]"));
    assert!(content.contains("[engine]"));
}

#[test]
fn test_custom_config_is_used() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("custom.toml");
    std::fs::write(&config_path, "[cache]\nprogram_cache_mb = 3\n").unwrap();

    celcache()
        .arg("--config")
        .arg(&config_path)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("\"program_max_cost\": {}", 3 * 1024 * 1024)));
}

#[test]
fn test_invalid_config_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("bad.toml");
    std::fs::write(&config_path, "[cache]\nprogram_cache_mb = 0\n").unwrap();

    celcache()
        .arg("--config")
        .arg(&config_path)
        .arg("version")
        .assert()
        .failure();
}

#[test]
fn test_invalid_command() {
    let output = celcache_bin()
        .arg("invalid-command-that-does-not-exist")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
}

#[test]
fn test_verbose_and_quiet_flags() {
    for flag in ["-v", "-q"] {
        let output = celcache_bin()
            .arg(flag)
            .arg("version")
            .output()
            .expect("Failed to execute command");
        assert!(output.status.success());
    }
}
