//! The debug service.
//!
//! [`DebugService`] owns the log store, tracer, test registry, mapping
//! engine, and feature registry, and exposes the registration, query,
//! execution, and persistence surface over them. Operations that mutate take
//! `&mut self`; callers that share a service across tasks wrap it in
//! [`SharedService`].

use crate::mapping::{
    Listener, ListenerFailure, MappingEngine, MappingEvent, OTHER_FEATURES, SubscriptionId,
};
use crate::models::{
    ApiTestResult, EnhancedFeatureStatus, ExecutionContext, Feature, FeatureTestInfo,
    FeatureTestResult, FeatureVerification, LogEntry, LogLevel, MappedTestStatus, RunSummary,
    TestStatus,
};
use crate::runner::endpoint::EndpointCheck;
use crate::runner::{FeatureTest, TestRegistry};
use crate::storage::{
    DEFAULT_API_RESULT_CAPACITY, DEFAULT_LOG_CAPACITY, LogFilter, LogStore, StoreSnapshot,
};
use crate::tracer::{DEFAULT_CONTEXT_CAPACITY, Tracer};
use crate::{Error, Result, runner, status};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Log area for service-level entries.
pub const SERVICE_AREA: &str = "debug";

/// A service shared between tasks.
pub type SharedService = Arc<tokio::sync::Mutex<DebugService>>;

/// Construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub log_capacity: usize,
    pub api_result_capacity: usize,
    /// Completed execution contexts retained by the tracer
    pub context_capacity: usize,
    pub test_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            api_result_capacity: DEFAULT_API_RESULT_CAPACITY,
            context_capacity: DEFAULT_CONTEXT_CAPACITY,
            test_timeout: runner::DEFAULT_TEST_TIMEOUT,
        }
    }
}

/// A feature with its mapped tests and recent related log entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDetail {
    pub feature: EnhancedFeatureStatus,
    pub tests: Vec<FeatureTestInfo>,
    pub logs: Vec<LogEntry>,
}

pub struct DebugService {
    store: LogStore,
    tracer: Tracer,
    registry: TestRegistry,
    mapping: MappingEngine,
    /// Registered features in registration order
    features: Vec<Feature>,
    api_tx: UnboundedSender<ApiTestResult>,
    api_rx: UnboundedReceiver<ApiTestResult>,
}

impl Default for DebugService {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugService {
    pub fn new() -> Self {
        Self::with_options(ServiceOptions::default())
    }

    pub fn with_options(options: ServiceOptions) -> Self {
        let mut registry = TestRegistry::new();
        registry.set_timeout(options.test_timeout);
        let (api_tx, api_rx) = unbounded_channel();
        Self {
            store: LogStore::with_capacity(options.log_capacity, options.api_result_capacity),
            tracer: Tracer::with_capacity(options.context_capacity),
            registry,
            mapping: MappingEngine::new(),
            features: Vec::new(),
            api_tx,
            api_rx,
        }
    }

    /// Wrap this service for sharing between tasks.
    pub fn into_shared(self) -> SharedService {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn test_timeout(&self) -> Duration {
        self.registry.timeout()
    }

    // === Registration ===

    /// Register or replace a feature test and rebuild the mapping.
    pub fn register_feature_test(&mut self, test: FeatureTest) -> Result<()> {
        let id = test.id.clone();
        if self.registry.register(test)? {
            self.store.add_log(LogEntry::new(
                LogLevel::Warn,
                runner::TESTS_AREA,
                format!("Feature test already registered, replaced: {}", id),
            ));
        }
        self.refresh_mapping();
        Ok(())
    }

    /// Remove a test, its result, and its mapping. Returns false if unknown.
    pub fn unregister_feature_test(&mut self, id: &str) -> bool {
        if self.registry.unregister(id).is_none() {
            return false;
        }
        self.store.remove_feature_test_result(id);
        self.refresh_mapping();
        true
    }

    /// Register an HTTP probe as a feature test.
    pub fn register_endpoint(&mut self, check: EndpointCheck, base_url: &str) -> Result<()> {
        let test = check.into_test(base_url, self.registry.timeout(), self.api_tx.clone());
        self.register_feature_test(test)
    }

    /// Register or update a feature. Verification flags survive re-registration.
    pub fn register_feature(&mut self, feature: Feature) -> Result<()> {
        if feature.name.trim().is_empty() {
            return Err(Error::Validation("Feature name must not be empty".to_string()));
        }
        match self.features.iter_mut().find(|f| f.name == feature.name) {
            Some(existing) => *existing = feature,
            None => self.features.push(feature),
        }
        self.refresh_mapping();
        Ok(())
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Verification flags live in the store so they are persisted and
    /// exported with it. Only registered features can be marked.
    fn verification_mut(&mut self, name: &str) -> Result<&mut FeatureVerification> {
        if !self.features.iter().any(|f| f.name == name) {
            return Err(Error::NotFound(format!("Feature not found: {}", name)));
        }
        Ok(self.store.feature_verification_mut(name))
    }

    /// Set the manual implemented flag, optionally appending a note.
    pub fn mark_implemented(
        &mut self,
        name: &str,
        implemented: bool,
        note: Option<&str>,
    ) -> Result<()> {
        let verification = self.verification_mut(name)?;
        verification.implemented = implemented;
        verification.last_verified = Some(Utc::now());
        if let Some(note) = note {
            verification.notes.push(note.to_string());
        }
        self.store.add_log(LogEntry::new(
            LogLevel::Info,
            SERVICE_AREA,
            format!("Feature {} marked implemented={}", name, implemented),
        ));
        Ok(())
    }

    pub fn mark_tested(&mut self, name: &str, tested: bool) -> Result<()> {
        let verification = self.verification_mut(name)?;
        verification.tested = tested;
        verification.last_verified = Some(Utc::now());
        Ok(())
    }

    pub fn add_feature_note(&mut self, name: &str, note: &str) -> Result<()> {
        if note.trim().is_empty() {
            return Err(Error::Validation("Note must not be empty".to_string()));
        }
        self.verification_mut(name)?.notes.push(note.to_string());
        Ok(())
    }

    pub fn verification(&self, name: &str) -> Option<&FeatureVerification> {
        self.store.get_feature_verification(name)
    }

    // === Mapping ===

    /// Rebuild the feature/test mapping and notify listeners.
    pub fn refresh_mapping(&mut self) -> Vec<ListenerFailure> {
        self.mapping.refresh(&self.features, &self.registry.infos());
        let event = MappingEvent::MappingRefreshed {
            features: self.mapping.index().forward.len(),
            tests: self.mapping.index().reverse.len(),
        };
        self.notify(&event)
    }

    pub fn mapping(&self) -> &MappingEngine {
        &self.mapping
    }

    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.mapping.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.mapping.unsubscribe(id)
    }

    fn notify(&mut self, event: &MappingEvent) -> Vec<ListenerFailure> {
        let failures = self.mapping.notify(event);
        for failure in &failures {
            let mut entry = LogEntry::new(
                LogLevel::Warn,
                "mapping",
                format!(
                    "Mapping listener {} failed: {}",
                    failure.subscription, failure.error
                ),
            );
            match serde_json::to_value(event) {
                Ok(data) => entry = entry.with_data(data),
                Err(e) => tracing::warn!("Could not serialize mapping event: {}", e),
            }
            self.store.add_log(entry);
        }
        failures
    }

    // === Queries ===

    /// Latest stored result of every test, ordered by test ID.
    pub fn get_test_results(&self) -> Vec<FeatureTestResult> {
        self.store.get_feature_test_results()
    }

    pub fn get_feature_tests(&self) -> Vec<FeatureTestInfo> {
        self.registry.infos()
    }

    pub fn get_tests_for_feature(&self, name: &str) -> Vec<FeatureTestInfo> {
        self.mapping
            .tests_for_feature(name)
            .iter()
            .filter_map(|id| self.registry.get(id).map(FeatureTest::info))
            .collect()
    }

    pub fn get_api_test_results(&self, limit: Option<usize>) -> Vec<ApiTestResult> {
        self.store.get_api_test_results(limit)
    }

    pub fn get_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.store.get_logs(filter)
    }

    fn mapped_statuses(&self, name: &str) -> Vec<MappedTestStatus> {
        self.mapping
            .tests_for_feature(name)
            .iter()
            .filter_map(|id| self.registry.get(id))
            .map(|test| {
                let result = self
                    .registry
                    .result(&test.id)
                    .or_else(|| self.store.get_feature_test_result(&test.id));
                MappedTestStatus {
                    id: test.id.clone(),
                    name: test.name.clone(),
                    status: result.map(|r| r.status).unwrap_or_default(),
                    last_run: result
                        .filter(|r| r.status.is_finished())
                        .map(|r| r.timestamp),
                    error: result.and_then(|r| r.error.clone()),
                }
            })
            .collect()
    }

    fn build_status(&self, name: &str) -> EnhancedFeatureStatus {
        let feature = self.features.iter().find(|f| f.name == name);
        let default_verification = FeatureVerification::default();
        let verification = self
            .store
            .get_feature_verification(name)
            .unwrap_or(&default_verification);
        status::aggregate(name, feature, verification, self.mapped_statuses(name))
    }

    /// Names of every known feature: registered ones first, then features
    /// that only received tests, with "Other Features" last.
    fn feature_names(&self) -> Vec<String> {
        let registered: HashSet<&str> = self.features.iter().map(|f| f.name.as_str()).collect();
        let mut names: Vec<String> = self.features.iter().map(|f| f.name.clone()).collect();
        let mut other = false;
        for name in self.mapping.mapped_features() {
            if name == OTHER_FEATURES {
                other = !registered.contains(name);
            } else if !registered.contains(name) {
                names.push(name.to_string());
            }
        }
        if other {
            names.push(OTHER_FEATURES.to_string());
        }
        names
    }

    pub fn get_enhanced_features(&self) -> Vec<EnhancedFeatureStatus> {
        self.feature_names()
            .iter()
            .map(|name| self.build_status(name))
            .collect()
    }

    pub fn get_enhanced_feature(&self, name: &str) -> Result<EnhancedFeatureStatus> {
        let known = self.features.iter().any(|f| f.name == name)
            || !self.mapping.tests_for_feature(name).is_empty();
        if !known {
            return Err(Error::NotFound(format!("Feature not found: {}", name)));
        }
        Ok(self.build_status(name))
    }

    /// A feature's status, its tests, and up to `log_limit` related log
    /// entries (same area or feature name, or traced under one of its tests).
    pub fn get_feature_detail(&self, name: &str, log_limit: usize) -> Result<FeatureDetail> {
        let feature = self.get_enhanced_feature(name)?;
        let tests = self.get_tests_for_feature(name);

        let test_ids: HashSet<&str> = tests.iter().map(|t| t.id.as_str()).collect();
        let contexts: HashSet<&str> = self
            .tracer
            .list_contexts()
            .into_iter()
            .filter(|c| c.test_id.as_deref().is_some_and(|id| test_ids.contains(id)))
            .map(|c| c.id.as_str())
            .chain(
                tests
                    .iter()
                    .filter_map(|t| self.store.get_feature_test_result(&t.id))
                    .filter_map(|r| r.context_id.as_deref()),
            )
            .collect();

        let logs = self
            .store
            .get_logs(&LogFilter::new())
            .into_iter()
            .filter(|entry| {
                entry.area == name
                    || feature.area.as_deref() == Some(entry.area.as_str())
                    || entry
                        .context_id
                        .as_deref()
                        .is_some_and(|ctx| contexts.contains(ctx))
            })
            .take(log_limit)
            .collect();

        Ok(FeatureDetail {
            feature,
            tests,
            logs,
        })
    }

    /// Markdown report of every known test and its latest result.
    pub fn generate_test_report(&self) -> String {
        let mut rows: BTreeMap<String, FeatureTestResult> = self
            .store
            .get_feature_test_results()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        for test in self.registry.tests() {
            rows.entry(test.id.clone()).or_insert_with(|| {
                FeatureTestResult::new(&test.id, &test.name, &test.description, TestStatus::NotStarted)
            });
        }

        let results: Vec<FeatureTestResult> = rows.into_values().collect();
        let summary = RunSummary::from_results(results, 0.0);

        let mut out = String::new();
        out.push_str("# Feature Test Report\n\n");
        out.push_str(&format!("Generated: {}\n\n", Utc::now().to_rfc3339()));
        out.push_str(&format!(
            "**Total:** {} | **Passed:** {} | **Failed:** {} | **Skipped:** {}\n\n",
            summary.total, summary.passed, summary.failed, summary.skipped
        ));
        out.push_str("| ID | Name | Status | Duration | Error |\n");
        out.push_str("|----|------|--------|----------|-------|\n");
        for result in &summary.results {
            out.push_str(&format!(
                "| {} | {} | {} | {:.1}ms | {} |\n",
                escape_cell(&result.id),
                escape_cell(&result.name),
                result.status,
                result.duration_ms,
                escape_cell(result.error.as_deref().unwrap_or(""))
            ));
        }
        out
    }

    // === Execution ===

    /// Run one test, store its result and any probe results, and notify listeners.
    pub async fn run_test(&mut self, id: &str) -> FeatureTestResult {
        let result = self
            .registry
            .run_test(id, &mut self.tracer, &mut self.store)
            .await;
        self.drain_api_results();
        self.notify_result(&result);
        result
    }

    /// Run every test in dependency order.
    pub async fn run_all(&mut self) -> RunSummary {
        let summary = self
            .registry
            .run_all(&mut self.tracer, &mut self.store)
            .await;
        self.drain_api_results();
        for result in &summary.results {
            self.notify_result(result);
        }
        summary
    }

    fn notify_result(&mut self, result: &FeatureTestResult) {
        let event = MappingEvent::TestStatusChanged {
            test_id: result.id.clone(),
            feature: self.mapping.feature_for_test(&result.id).map(str::to_string),
            status: result.status,
        };
        self.notify(&event);
    }

    fn drain_api_results(&mut self) {
        while let Ok(result) = self.api_rx.try_recv() {
            self.store.add_api_test_result(result);
        }
    }

    // === Tracing ===

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// The tracer together with the store it writes into.
    pub fn tracer_mut(&mut self) -> (&mut Tracer, &mut LogStore) {
        (&mut self.tracer, &mut self.store)
    }

    pub fn create_context(&mut self, feature: Option<&str>, test_id: Option<&str>) -> String {
        self.tracer.create_context(&mut self.store, feature, test_id)
    }

    pub fn log_step(
        &mut self,
        context_id: &str,
        message: &str,
        level: LogLevel,
        area: &str,
        data: Option<serde_json::Value>,
    ) {
        self.tracer
            .log_step(&mut self.store, context_id, message, level, area, data);
    }

    pub fn complete_context(
        &mut self,
        context_id: &str,
        success: bool,
        data: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Result<()> {
        self.tracer
            .complete_context(&mut self.store, context_id, success, data)
    }

    pub fn get_context(&self, context_id: &str) -> Option<&ExecutionContext> {
        self.tracer.get_context(context_id)
    }

    /// Append an uncorrelated entry to the store.
    pub fn log(&mut self, entry: LogEntry) {
        self.store.add_log(entry);
    }

    // === Persistence ===

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn export(&self) -> StoreSnapshot {
        self.store.export()
    }

    pub fn export_json(&self) -> Result<String> {
        self.store.export_json()
    }

    /// Replace the store's contents and reseed test results from it.
    ///
    /// Returns false without touching anything if the payload is malformed.
    pub fn import(&mut self, blob: &serde_json::Value) -> bool {
        if !self.store.import(blob) {
            return false;
        }
        self.reseed_results();
        true
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.store.save(path)
    }

    /// Load a persisted store. Returns false if there was nothing to load.
    pub fn load(&mut self, path: &Path) -> Result<bool> {
        let loaded = self.store.load(path)?;
        if loaded {
            self.reseed_results();
        }
        Ok(loaded)
    }

    fn reseed_results(&mut self) {
        self.registry.clear_results();
        self.registry
            .restore_results(self.store.get_feature_test_results());
    }

    pub fn clear_logs(&mut self) {
        self.store.clear_logs();
    }

    pub fn clear_test_results(&mut self) {
        self.store.clear_feature_test_results();
        self.registry.clear_results();
    }

    pub fn clear_api_results(&mut self) {
        self.store.clear_api_test_results();
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
        self.registry.clear_results();
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}
