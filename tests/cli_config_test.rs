//! Integration tests for config.kdl loading and `fl config`.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_config_show_defaults() {
    let env = TestEnv::new();
    let shown = env.json(&["config", "show"]);
    assert_eq!(shown["configExists"], false);
    assert_eq!(shown["settings"]["baseUrl"]["value"], "http://localhost:3000");
    assert_eq!(shown["settings"]["baseUrl"]["source"], "default");
    assert_eq!(shown["settings"]["testTimeoutMs"]["value"], 30000);
    assert_eq!(shown["settings"]["logCapacity"]["value"], 1000);
    assert_eq!(shown["settings"]["contextCapacity"]["value"], 100);
}

#[test]
fn test_config_show_reports_sources() {
    let env = TestEnv::with_config(
        "log-capacity 50\ncontext-capacity 7\ntest-timeout-ms 1000\nbase-url \"http://goals.local\"\n",
    );

    let output = env
        .fl()
        .args(["config", "show", "--base-url", "http://cli.local"])
        .env("FL_TEST_TIMEOUT_MS", "250")
        .assert()
        .success()
        .get_output()
        .clone();
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(shown["configExists"], true);
    assert_eq!(shown["settings"]["logCapacity"]["value"], 50);
    assert!(
        shown["settings"]["logCapacity"]["source"]
            .as_str()
            .unwrap()
            .starts_with("config:")
    );
    assert_eq!(shown["settings"]["contextCapacity"]["value"], 7);
    assert_eq!(shown["settings"]["testTimeoutMs"]["value"], 250);
    assert_eq!(shown["settings"]["testTimeoutMs"]["source"], "env:FL_TEST_TIMEOUT_MS");
    assert_eq!(shown["settings"]["baseUrl"]["value"], "http://cli.local");
    assert_eq!(shown["settings"]["baseUrl"]["source"], "cli");
}

#[test]
fn test_config_show_human() {
    let env = TestEnv::new();
    env.fl()
        .args(["-H", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base-url = http://localhost:3000 (default)"));
}

#[test]
fn test_invalid_config_rejected() {
    let env = TestEnv::with_config("log-capacity 0\n");
    env.fl()
        .arg("tests")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));

    env.write_config("endpoint \"x\" path=\"/\" expect-status=999\n");
    env.fl().arg("tests").assert().failure();

    env.write_config("feature {\n");
    env.fl().arg("tests").assert().failure();
}

#[test]
fn test_config_init_then_show() {
    let env = TestEnv::new();
    let written = env.json(&["config", "init"]);
    assert_eq!(written["written"], true);
    assert!(env.data_path().join("config.kdl").exists());

    env.fl()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let shown = env.json(&["config", "show"]);
    assert_eq!(shown["configExists"], true);
    assert_eq!(shown["endpoints"], 1);

    let tests = env.json(&["tests"]);
    assert_eq!(tests["tests"][0]["id"], "api-health-check");
}

#[test]
fn test_config_init_repairs_broken_file() {
    let env = TestEnv::with_config("feature {\n");
    env.fl().args(["config", "init", "--force"]).assert().success();
    env.fl().arg("tests").assert().success();
}

#[test]
fn test_explicit_config_path() {
    let env = TestEnv::new();
    let path = env.data_path().join("custom.kdl");
    std::fs::write(&path, "feature \"reports\" area=\"reports\"\n").unwrap();

    let output = env
        .fl()
        .args(["features"])
        .env("FL_CONFIG", &path)
        .assert()
        .success()
        .get_output()
        .clone();
    let features: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(
        features["features"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["name"] == "reports")
    );
}
