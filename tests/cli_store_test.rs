//! Integration tests for the persisted debug store: logs, export/import, clear, query.

mod common;

use common::{TestEnv, closed_url, serve};
use predicates::prelude::*;

fn seeded_env() -> TestEnv {
    let env = TestEnv::with_config(&format!(
        "base-url \"{}\"\nendpoint \"api-health-check\" path=\"/api/health\"\n",
        closed_url()
    ));
    env.fl().arg("run").assert().success();
    env
}

#[test]
fn test_run_writes_traced_logs() {
    let env = seeded_env();

    let logs = env.json(&["logs"]);
    assert!(logs["count"].as_u64().unwrap() > 0);

    let errors = env.json(&["logs", "--level", "error"]);
    for entry in errors["logs"].as_array().unwrap() {
        assert_eq!(entry["level"], "error");
    }

    let limited = env.json(&["logs", "--limit", "1"]);
    assert_eq!(limited["count"], 1);

    let tests_area = env.json(&["logs", "--area", "tests"]);
    assert!(
        tests_area["logs"]
            .as_array()
            .unwrap()
            .iter()
            .all(|e| e["area"] == "tests")
    );
}

#[test]
fn test_logs_time_bounds() {
    let env = seeded_env();

    let future = env.json(&["logs", "--from", "2999-01-01"]);
    assert_eq!(future["count"], 0);

    let past = env.json(&["logs", "--to", "2000-01-01"]);
    assert_eq!(past["count"], 0);

    env.fl()
        .args(["logs", "--from", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_export_import_round_trip() {
    let env = seeded_env();
    let snapshot = env.data_path().join("snapshot.json");

    env.fl()
        .arg("export")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"logs\""));

    let before = env.json(&["results"]);

    env.fl().arg("clear").assert().success();
    assert_eq!(env.json(&["results"])["count"], 0);
    assert_eq!(env.json(&["logs"])["count"], 0);

    let imported = env.json(&["import", snapshot.to_str().unwrap()]);
    assert_eq!(imported["imported"], true);

    let after = env.json(&["results"]);
    assert_eq!(after, before);
}

#[test]
fn test_export_to_stdout_is_snapshot() {
    let env = seeded_env();
    let snapshot = env.json(&["export"]);
    assert!(snapshot["logs"].is_array());
    assert!(snapshot["featureTestResults"]["api-health-check"].is_object());
    assert!(snapshot["apiTestResults"].is_array());
}

#[test]
fn test_import_rejects_garbage() {
    let env = seeded_env();
    let bad = env.data_path().join("bad.json");
    std::fs::write(&bad, r#"{"featureTestResults": {}}"#).unwrap();

    env.fl()
        .arg("import")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a debug store snapshot"));

    // Store untouched
    assert_eq!(env.json(&["results"])["count"], 1);
}

#[test]
fn test_selective_clear() {
    let env = seeded_env();

    let cleared = env.json(&["clear", "--logs"]);
    assert_eq!(cleared["cleared"], serde_json::json!(["logs"]));
    assert_eq!(env.json(&["logs"])["count"], 0);
    assert_eq!(env.json(&["results"])["count"], 1);
    assert_eq!(env.json(&["api"])["count"], 1);

    env.json(&["clear", "--api"]);
    assert_eq!(env.json(&["api"])["count"], 0);
    assert_eq!(env.json(&["results"])["count"], 1);
}

#[test]
fn test_corrupt_store_reported_and_recoverable() {
    let env = TestEnv::new();
    std::fs::write(env.data_path().join("debug-store.json"), "{oops").unwrap();

    env.fl()
        .arg("results")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt store file"));

    env.fl().arg("clear").assert().success();
    assert_eq!(env.json(&["results"])["count"], 0);
}

#[test]
fn test_allow_listed_queries() {
    let env = seeded_env();

    let features = env.json(&["query", "getEnhancedFeatures()"]);
    let names: Vec<&str> = features
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert!(names.contains(&"api-health"));

    let tests = env.json(&["query", "getTestsForFeature('api-health')"]);
    assert_eq!(tests[0]["id"], "api-health-check");

    let run = env.json(&["query", "debugService.runTest('api-health-check');"]);
    assert_eq!(run["status"], "failed");
}

#[test]
fn test_query_outside_allow_list_rejected() {
    let env = TestEnv::new();
    for query in ["clearAll()", "require('fs')", "getLogs('a', 'b')"] {
        env.fl()
            .args(["query", query])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported query"));
    }
}

#[test]
fn test_manual_marks_persist_between_invocations() {
    let env = TestEnv::with_config("feature \"reports\" area=\"reports\"\n");

    let marked = env.json(&[
        "mark",
        "reports",
        "--implemented",
        "true",
        "--note",
        "checked by hand",
    ]);
    assert_eq!(marked["feature"]["implemented"], true);
    assert_eq!(marked["feature"]["implementationSource"], "manual");

    let shown = env.json(&["features", "reports"]);
    assert_eq!(shown["feature"]["implementationSource"], "manual");
    assert_eq!(shown["feature"]["notes"][0], "checked by hand");

    env.json(&["mark", "reports", "--tested", "true"]);
    let snapshot = env.json(&["export"]);
    let verification = &snapshot["featureVerifications"]["reports"];
    assert_eq!(verification["implemented"], true);
    assert_eq!(verification["tested"], true);

    env.fl().arg("clear").assert().success();
    assert_eq!(env.json(&["features", "reports"])["feature"]["implemented"], true);
}

#[test]
fn test_mark_rejects_unknown_feature_and_empty_request() {
    let env = TestEnv::new();
    env.fl()
        .args(["mark", "no-such-feature", "--implemented", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Feature not found"));

    env.fl()
        .args(["mark", "reports"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to mark"));
}

#[test]
fn test_passing_tests_override_manual_not_implemented() {
    let base = serve(200, "{}", 1);
    let env = TestEnv::with_config(&format!(
        "base-url \"{}\"\nfeature \"reports\" area=\"reports\"\nendpoint \"report-list\" path=\"/api/reports\" feature=\"reports\"\n",
        base
    ));

    let marked = env.json(&["mark", "reports", "--implemented", "false"]);
    assert_eq!(marked["feature"]["implemented"], false);

    env.fl().arg("run").assert().success();
    let shown = env.json(&["features", "reports"]);
    assert_eq!(shown["feature"]["implemented"], true);
    assert_eq!(shown["feature"]["implementationSource"], "tests");
}
