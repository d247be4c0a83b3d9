//! Feature test registry and runner.
//!
//! Tests are async predicates registered under a unique ID with optional
//! dependencies on other tests. A test only runs when every dependency has a
//! PASSED result; otherwise it is SKIPPED without its body being invoked.
//! `run_all` executes tests one at a time in dependency order.
//!
//! Each body runs on a dedicated thread with its own current-thread runtime,
//! so synchronous and async bodies are both held to the timeout. A body that
//! outlives its timeout is abandoned, not cancelled.

pub mod endpoint;

use crate::models::graph::{dependency_order, has_cycle_through};
use crate::models::{
    FeatureTestInfo, FeatureTestResult, LogEntry, LogLevel, RunSummary, TestStatus,
};
use crate::storage::LogStore;
use crate::tracer::Tracer;
use crate::{Error, Result};
use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Default per-test timeout.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Log area for runner entries.
pub const TESTS_AREA: &str = "tests";

/// Error a test body may return. Any error type converts with `?`.
pub type TestError = Box<dyn std::error::Error + Send + Sync>;

/// What a test body resolves to: `Ok(true)` passes, `Ok(false)` or `Err` fails.
pub type TestOutcome = std::result::Result<bool, TestError>;

/// Type-erased async test body.
pub type TestFn = Arc<dyn Fn() -> BoxFuture<'static, TestOutcome> + Send + Sync>;

/// A registered feature test.
#[derive(Clone)]
pub struct FeatureTest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub area: String,
    pub dependencies: Vec<String>,
    /// Feature this test verifies, bypassing heuristic mapping
    pub feature_name: Option<String>,
    body: TestFn,
}

impl FeatureTest {
    /// Create a test with no dependencies.
    pub fn new<F, Fut>(
        id: impl Into<String>,
        name: impl Into<String>,
        area: impl Into<String>,
        body: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            area: area.into(),
            dependencies: Vec::new(),
            feature_name: None,
            body: Arc::new(move || body().boxed()),
        }
    }

    /// Create a test from a synchronous body. It may block.
    pub fn blocking<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        area: impl Into<String>,
        body: F,
    ) -> Self
    where
        F: Fn() -> TestOutcome + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        Self::new(id, name, area, move || {
            let body = Arc::clone(&body);
            async move { body() }
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Require `dependency` to pass before this test runs.
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Map this test directly to `feature`.
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature_name = Some(feature.into());
        self
    }

    /// Serializable description of this test.
    pub fn info(&self) -> FeatureTestInfo {
        FeatureTestInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            area: self.area.clone(),
            dependencies: self.dependencies.clone(),
            feature_name: self.feature_name.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [("id", &self.id), ("name", &self.name), ("area", &self.area)] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("Test {} must not be empty", field)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FeatureTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureTest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("area", &self.area)
            .field("dependencies", &self.dependencies)
            .field("feature_name", &self.feature_name)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Registered tests plus the latest result of each.
pub struct TestRegistry {
    /// Tests in registration order
    tests: Vec<FeatureTest>,
    results: HashMap<String, FeatureTestResult>,
    timeout: Duration,
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRegistry {
    pub fn new() -> Self {
        Self {
            tests: Vec::new(),
            results: HashMap::new(),
            timeout: DEFAULT_TEST_TIMEOUT,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Register or replace a test.
    ///
    /// Returns true if a test with the same ID was replaced. A replaced test
    /// keeps its registration position.
    pub fn register(&mut self, test: FeatureTest) -> Result<bool> {
        test.validate()?;
        let id = test.id.clone();

        let replaced = match self.tests.iter_mut().find(|t| t.id == test.id) {
            Some(existing) => {
                tracing::warn!(test = %test.id, "Feature test already registered, replacing");
                *existing = test;
                true
            }
            None => {
                self.tests.push(test);
                false
            }
        };

        if has_cycle_through(&id, &self.dependency_nodes()) {
            tracing::warn!(test = %id, "Feature test is part of a dependency cycle");
        }

        Ok(replaced)
    }

    /// Remove a test and its in-memory result.
    pub fn unregister(&mut self, id: &str) -> Option<FeatureTest> {
        let index = self.tests.iter().position(|t| t.id == id)?;
        self.results.remove(id);
        Some(self.tests.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&FeatureTest> {
        self.tests.iter().find(|t| t.id == id)
    }

    /// Tests in registration order.
    pub fn tests(&self) -> &[FeatureTest] {
        &self.tests
    }

    pub fn infos(&self) -> Vec<FeatureTestInfo> {
        self.tests.iter().map(FeatureTest::info).collect()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn result(&self, id: &str) -> Option<&FeatureTestResult> {
        self.results.get(id)
    }

    /// Latest results of registered tests, in registration order.
    pub fn results(&self) -> Vec<FeatureTestResult> {
        self.tests
            .iter()
            .filter_map(|t| self.results.get(&t.id).cloned())
            .collect()
    }

    /// Seed results from a previous process so dependency checks see them.
    pub fn restore_results<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = FeatureTestResult>,
    {
        for result in results {
            if result.status.is_finished() {
                self.results.insert(result.id.clone(), result);
            }
        }
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    fn dependency_nodes(&self) -> Vec<(String, Vec<String>)> {
        self.tests
            .iter()
            .map(|t| (t.id.clone(), t.dependencies.clone()))
            .collect()
    }

    /// Execution order for `run_all`: dependencies first, cyclic tests last.
    pub fn execution_order(&self) -> Vec<String> {
        let order = dependency_order(&self.dependency_nodes());
        if !order.cyclic.is_empty() {
            tracing::warn!(tests = ?order.cyclic, "Dependency cycle detected");
        }
        order.into_sequence()
    }

    fn record(&mut self, store: &mut LogStore, result: FeatureTestResult) {
        store.add_feature_test_result(result.clone());
        self.results.insert(result.id.clone(), result);
    }

    /// Run one test and record its result.
    ///
    /// Always resolves to a result; failures of any kind become FAILED.
    pub async fn run_test(
        &mut self,
        id: &str,
        tracer: &mut Tracer,
        store: &mut LogStore,
    ) -> FeatureTestResult {
        let Some(test) = self.get(id).cloned() else {
            let result = FeatureTestResult::new(id, id, "", TestStatus::Failed)
                .with_error(format!("Test not found: {}", id));
            store.add_log(LogEntry::new(
                LogLevel::Error,
                TESTS_AREA,
                format!("Test not found: {}", id),
            ));
            store.add_feature_test_result(result.clone());
            return result;
        };

        let unmet: Vec<&str> = test
            .dependencies
            .iter()
            .filter(|dep| {
                self.results
                    .get(dep.as_str())
                    .is_none_or(|r| r.status != TestStatus::Passed)
            })
            .map(String::as_str)
            .collect();

        if !unmet.is_empty() {
            let error = format!("Unmet dependencies: {}", unmet.join(", "));
            store.add_log(LogEntry::new(
                LogLevel::Warn,
                TESTS_AREA,
                format!("Test skipped: {} ({})", test.id, error),
            ));
            let result = FeatureTestResult::new(
                &test.id,
                &test.name,
                &test.description,
                TestStatus::Skipped,
            )
            .with_error(error);
            self.record(store, result.clone());
            return result;
        }

        let running = FeatureTestResult::new(
            &test.id,
            &test.name,
            &test.description,
            TestStatus::Running,
        );
        self.results.insert(test.id.clone(), running);

        let feature = test.feature_name.as_deref().unwrap_or(&test.area);
        let context_id = tracer.create_context(store, Some(feature), Some(&test.id));
        tracer.log_step(
            store,
            &context_id,
            &format!("Running test: {}", test.name),
            LogLevel::Info,
            TESTS_AREA,
            None,
        );

        let start = Instant::now();
        let (status, error) = self.invoke(&test).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let passed = status == TestStatus::Passed;
        if let Err(e) = tracer.complete_context(store, &context_id, passed, None) {
            tracing::warn!(context = %context_id, "Could not complete context: {}", e);
        }

        let mut result = FeatureTestResult::new(&test.id, &test.name, &test.description, status);
        result.error = error;
        result.duration_ms = duration_ms;
        result.timestamp = Utc::now();
        result.context_id = Some(context_id.clone());

        let entry = if passed {
            LogEntry::new(
                LogLevel::Info,
                TESTS_AREA,
                format!("Test passed: {} ({:.1}ms)", test.id, duration_ms),
            )
        } else {
            LogEntry::new(
                LogLevel::Error,
                TESTS_AREA,
                format!(
                    "Test failed: {}: {}",
                    test.id,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            )
        };
        store.add_log(entry.with_context(context_id));

        self.record(store, result.clone());
        result
    }

    /// Run the body on its own thread and runtime so a blocking body cannot
    /// hold the caller past the timeout.
    async fn invoke(&self, test: &FeatureTest) -> (TestStatus, Option<String>) {
        let body = Arc::clone(&test.body);
        let (tx, rx) = oneshot::channel::<std::result::Result<TestOutcome, String>>();

        let spawned = std::thread::Builder::new()
            .name("fl-test".to_string())
            .spawn(move || {
                let finished = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => {
                        std::panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(body())))
                            .map_err(|payload| {
                                format!("Test panicked: {}", panic_message(payload.as_ref()))
                            })
                    }
                    Err(e) => Err(format!("Could not start test runtime: {}", e)),
                };
                // Receiver is gone once the test timed out
                let _ = tx.send(finished);
            });
        if let Err(e) = spawned {
            return (
                TestStatus::Failed,
                Some(format!("Could not start test thread: {}", e)),
            );
        }

        let start = Instant::now();
        let waited = tokio::time::timeout(self.timeout, rx).await;
        let overran = start.elapsed() > self.timeout;

        match waited {
            Err(_) => (TestStatus::Failed, Some(self.timeout_message())),
            Ok(Ok(_)) if overran => (TestStatus::Failed, Some(self.timeout_message())),
            Ok(Ok(Ok(Ok(true)))) => (TestStatus::Passed, None),
            Ok(Ok(Ok(Ok(false)))) => (TestStatus::Failed, Some("Test returned false".to_string())),
            Ok(Ok(Ok(Err(e)))) => (TestStatus::Failed, Some(e.to_string())),
            Ok(Ok(Err(message))) => (TestStatus::Failed, Some(message)),
            Ok(Err(_)) => (
                TestStatus::Failed,
                Some("Test thread exited without a result".to_string()),
            ),
        }
    }

    fn timeout_message(&self) -> String {
        format!("timeout after {}ms", self.timeout.as_millis())
    }

    /// Run every registered test, one at a time, in dependency order.
    pub async fn run_all(&mut self, tracer: &mut Tracer, store: &mut LogStore) -> RunSummary {
        let start = Instant::now();
        let mut results = Vec::with_capacity(self.tests.len());
        for id in self.execution_order() {
            results.push(self.run_test(&id, tracer, store).await);
        }
        let summary = RunSummary::from_results(results, start.elapsed().as_secs_f64() * 1000.0);

        store.add_log(
            LogEntry::new(
                if summary.failed > 0 {
                    LogLevel::Warn
                } else {
                    LogLevel::Info
                },
                TESTS_AREA,
                format!(
                    "Ran {} tests: {} passed, {} failed, {} skipped",
                    summary.total, summary.passed, summary.failed, summary.skipped
                ),
            )
            .with_data(serde_json::json!({"durationMs": summary.duration_ms})),
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LogFilter;
    use crate::test_utils::{counting_test, fixed_test};
    use std::sync::atomic::Ordering;

    fn fixture() -> (TestRegistry, Tracer, LogStore) {
        (TestRegistry::new(), Tracer::new(), LogStore::new())
    }

    #[tokio::test]
    async fn test_passing_test() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.register(fixed_test("t1", "dashboard", true)).unwrap();

        let result = registry.run_test("t1", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Passed);
        assert!(result.duration_ms >= 0.0);
        assert!(result.error.is_none());

        let ctx = tracer.get_context(result.context_id.as_deref().unwrap()).unwrap();
        assert_eq!(ctx.status, crate::models::ContextStatus::Success);
        assert_eq!(store.get_feature_test_result("t1").unwrap().status, TestStatus::Passed);
    }

    #[tokio::test]
    async fn test_unmet_dependency_skips_without_running() {
        let (mut registry, mut tracer, mut store) = fixture();
        let (t2, calls) = counting_test("t2", "dashboard");
        registry.register(fixed_test("t1", "dashboard", true)).unwrap();
        registry.register(t2.depends_on("t1")).unwrap();

        let result = registry.run_test("t2", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Skipped);
        assert!(result.error.as_deref().unwrap().contains("t1"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(tracer.is_empty());

        registry.run_test("t1", &mut tracer, &mut store).await;
        let result = registry.run_test("t2", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_dependency_skips() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.register(fixed_test("a", "x", false)).unwrap();
        registry.register(fixed_test("b", "x", true).depends_on("a")).unwrap();

        registry.run_test("a", &mut tracer, &mut store).await;
        let result = registry.run_test("b", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Skipped);
        assert_eq!(result.error.as_deref(), Some("Unmet dependencies: a"));
    }

    #[tokio::test]
    async fn test_error_message_becomes_failure() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry
            .register(FeatureTest::new("t3", "Boom", "goals", || async {
                Err::<bool, TestError>("boom".into())
            }))
            .unwrap();

        let result = registry.run_test("t3", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("boom"));

        let ctx = tracer.get_context(result.context_id.as_deref().unwrap()).unwrap();
        assert_eq!(ctx.status, crate::models::ContextStatus::Failure);
    }

    #[tokio::test]
    async fn test_false_return_fails() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.register(fixed_test("t1", "goals", false)).unwrap();
        let result = registry.run_test("t1", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("Test returned false"));
    }

    #[tokio::test]
    async fn test_unknown_test_fails() {
        let (mut registry, mut tracer, mut store) = fixture();
        let result = registry.run_test("ghost", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("Test not found: ghost"));
        assert!(store.get_feature_test_result("ghost").is_some());
    }

    #[tokio::test]
    async fn test_timeout_fails() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.set_timeout(Duration::from_millis(20));
        registry
            .register(FeatureTest::new("slow", "Slow", "goals", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                TestOutcome::Ok(true)
            }))
            .unwrap();

        let result = registry.run_test("slow", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("timeout after 20ms"));
    }

    #[tokio::test]
    async fn test_panic_fails() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry
            .register(FeatureTest::new("p", "Panics", "goals", || async {
                if true {
                    panic!("kaboom");
                }
                TestOutcome::Ok(true)
            }))
            .unwrap();

        let result = registry.run_test("p", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("Test panicked: kaboom"));
    }

    #[tokio::test]
    async fn test_blocking_body_held_to_timeout() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.set_timeout(Duration::from_millis(20));
        registry
            .register(FeatureTest::blocking("sleepy", "Sleepy", "goals", || {
                std::thread::sleep(Duration::from_millis(300));
                Ok(true)
            }))
            .unwrap();

        let start = Instant::now();
        let result = registry.run_test("sleepy", &mut tracer, &mut store).await;
        assert!(start.elapsed() < Duration::from_millis(250));
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("timeout after 20ms"));
    }

    #[tokio::test]
    async fn test_blocking_body_inside_async_block() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.set_timeout(Duration::from_millis(20));
        registry
            .register(FeatureTest::new("stuck", "Stuck", "goals", || async {
                std::thread::sleep(Duration::from_secs(2));
                TestOutcome::Ok(true)
            }))
            .unwrap();
        registry.register(fixed_test("after", "goals", true)).unwrap();

        let summary = tokio::time::timeout(
            Duration::from_secs(1),
            registry.run_all(&mut tracer, &mut store),
        )
        .await
        .expect("a blocked body must not stall run_all");
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed, 1);
    }

    #[tokio::test]
    async fn test_blocking_body_passes_and_panics() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry
            .register(FeatureTest::blocking("sync-ok", "Sync", "goals", || Ok(true)))
            .unwrap();
        registry
            .register(FeatureTest::blocking("sync-panic", "Sync", "goals", || {
                panic!("sync kaboom")
            }))
            .unwrap();

        let ok = registry.run_test("sync-ok", &mut tracer, &mut store).await;
        assert_eq!(ok.status, TestStatus::Passed);

        let panicked = registry.run_test("sync-panic", &mut tracer, &mut store).await;
        assert_eq!(panicked.status, TestStatus::Failed);
        assert_eq!(panicked.error.as_deref(), Some("Test panicked: sync kaboom"));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = TestRegistry::new();
        assert!(!registry.register(fixed_test("a", "x", true)).unwrap());
        assert!(!registry.register(fixed_test("b", "x", true)).unwrap());
        assert!(registry
            .register(fixed_test("a", "y", true).with_description("new"))
            .unwrap());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tests()[0].id, "a");
        assert_eq!(registry.tests()[0].area, "y");
        assert_eq!(registry.tests()[0].description, "new");
    }

    #[test]
    fn test_register_validates() {
        let mut registry = TestRegistry::new();
        let err = registry.register(fixed_test("", "x", true)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = registry.register(fixed_test("a", " ", true)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister() {
        let mut registry = TestRegistry::new();
        registry.register(fixed_test("a", "x", true)).unwrap();
        assert!(registry.unregister("a").is_some());
        assert!(registry.unregister("a").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_run_all_orders_dependencies_first() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.register(fixed_test("c", "x", true).depends_on("b")).unwrap();
        registry.register(fixed_test("b", "x", true).depends_on("a")).unwrap();
        registry.register(fixed_test("a", "x", true)).unwrap();

        let summary = registry.run_all(&mut tracer, &mut store).await;
        let order: Vec<&str> = summary.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.total, 3);
    }

    #[tokio::test]
    async fn test_run_all_with_cycle_terminates() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.register(fixed_test("x", "x", true).depends_on("y")).unwrap();
        registry.register(fixed_test("y", "x", true).depends_on("x")).unwrap();
        registry.register(fixed_test("ok", "x", true)).unwrap();

        let summary = registry.run_all(&mut tracer, &mut store).await;
        let order: Vec<&str> = summary.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["ok", "x", "y"]);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test]
    async fn test_run_all_summary_log() {
        let (mut registry, mut tracer, mut store) = fixture();
        registry.register(fixed_test("a", "x", true)).unwrap();
        registry.register(fixed_test("b", "x", false)).unwrap();

        let summary = registry.run_all(&mut tracer, &mut store).await;
        assert_eq!(summary.failed, 1);
        let latest = &store.get_logs(&LogFilter::new().area(TESTS_AREA).limit(1))[0];
        assert_eq!(latest.message, "Ran 2 tests: 1 passed, 1 failed, 0 skipped");
    }

    #[tokio::test]
    async fn test_restore_results_satisfies_dependencies() {
        let (mut registry, mut tracer, mut store) = fixture();
        let (b, calls) = counting_test("b", "x");
        registry.register(fixed_test("a", "x", true)).unwrap();
        registry.register(b.depends_on("a")).unwrap();

        registry.restore_results(vec![
            FeatureTestResult::new("a", "a test", "", TestStatus::Passed),
            FeatureTestResult::new("b", "b test", "", TestStatus::Running),
        ]);
        assert!(registry.result("b").is_none());

        let result = registry.run_test("b", &mut tracer, &mut store).await;
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
