//! Integration tests for running configured endpoint tests.

mod common;

use common::{TestEnv, closed_url, serve};
use predicates::prelude::*;

fn config_for(base_url: &str) -> String {
    format!(
        r#"base-url "{}"
test-timeout-ms 5000
feature "goal-management" area="goals" description="Create and list goals"
endpoint "goal-list" path="/api/goals" feature="goal-management"
endpoint "goal-create" path="/api/goals" method="POST" expect-status=200 depends-on="goal-list" feature="goal-management"
"#,
        base_url
    )
}

#[test]
fn test_tests_lists_configured_endpoints() {
    let env = TestEnv::with_config(&config_for("http://localhost:1")); // never contacted
    let json = env.json(&["tests"]);
    assert_eq!(json["count"], 2);
    assert_eq!(json["tests"][0]["id"], "goal-list");
    assert_eq!(json["tests"][0]["name"], "GET /api/goals");
    assert_eq!(json["tests"][1]["dependencies"][0], "goal-list");
}

#[test]
fn test_run_all_passes_against_live_server() {
    let base = serve(200, r#"{"goals":[]}"#, 2);
    let env = TestEnv::with_config(&config_for(&base));

    let summary = env.json(&["run"]);
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["passed"], 2);
    assert_eq!(summary["results"][0]["id"], "goal-list");
    assert_eq!(summary["results"][1]["id"], "goal-create");

    let feature = env.json(&["features", "goal-management"]);
    assert_eq!(feature["feature"]["testStatus"], "passed");
    assert_eq!(feature["feature"]["implemented"], true);
    assert_eq!(feature["feature"]["implementationSource"], "tests");

    let api = env.json(&["api"]);
    assert_eq!(api["count"], 2);
    assert_eq!(api["results"][0]["status"], 200);
}

#[test]
fn test_failed_dependency_skips_dependent() {
    let env = TestEnv::with_config(&config_for(&closed_url()));

    let summary = env.json(&["run"]);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["skipped"], 1);
    assert_eq!(
        summary["results"][1]["error"],
        "Unmet dependencies: goal-list"
    );

    let feature = env.json(&["features", "goal-management"]);
    assert_eq!(feature["feature"]["testStatus"], "failed");
    assert_eq!(feature["feature"]["implemented"], false);
}

#[test]
fn test_unexpected_status_fails_with_reason() {
    let base = serve(500, r#"{"error":"db down"}"#, 1);
    let env = TestEnv::with_config(&config_for(&base));

    let result = env.json(&["run", "goal-list"]);
    assert_eq!(result["status"], "failed");
    assert!(
        result["error"]
            .as_str()
            .unwrap()
            .contains("expected status 200, got 500")
    );
}

#[test]
fn test_base_url_flag_overrides_config() {
    let base = serve(200, "{}", 1);
    let env = TestEnv::with_config(&config_for(&closed_url()));

    let result = env.json(&["run", "goal-list", "--base-url", &base]);
    assert_eq!(result["status"], "passed");
}

#[test]
fn test_base_url_env_overrides_config() {
    let base = serve(200, "{}", 1);
    let env = TestEnv::with_config(&config_for(&closed_url()));

    let output = env
        .fl()
        .args(["run", "goal-list"])
        .env("FL_BASE_URL", &base)
        .assert()
        .success()
        .get_output()
        .clone();
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["status"], "passed");
}

#[test]
fn test_results_and_report_survive_between_runs() {
    let env = TestEnv::with_config(&config_for(&closed_url()));
    env.fl().arg("run").assert().success();

    let results = env.json(&["results"]);
    assert_eq!(results["count"], 2);

    env.fl()
        .args(["-H", "report"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Feature Test Report"))
        .stdout(predicate::str::contains("| goal-list |"))
        .stdout(predicate::str::contains("Unmet dependencies: goal-list"));
}

#[test]
fn test_run_unknown_id_fails() {
    let env = TestEnv::with_config(&config_for(&closed_url()));
    env.fl()
        .args(["run", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Test not found: ghost"));
}

#[test]
fn test_run_without_tests_human() {
    let env = TestEnv::new();
    env.fl()
        .args(["-H", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tests configured"));
}
