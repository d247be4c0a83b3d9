//! Data models for Featurelens entities.
//!
//! This module defines the core data structures:
//! - `LogEntry` - Leveled, area-tagged log lines, optionally correlated to a context
//! - `ExecutionContext` - Correlation unit for one traced operation
//! - `FeatureTestResult` - Outcome of the latest run of a feature test
//! - `ApiTestResult` - Outcome of a single endpoint probe
//! - `Feature` / `FeatureVerification` - Registered features and their manual flags
//! - `EnhancedFeatureStatus` - Derived view folding flags and test results together

pub mod graph;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Severity of a log entry. Ordered so that filters can use `>=`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// A single log line. Immutable once written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Severity
    pub level: LogLevel,

    /// Functional area that emitted the entry (e.g., "api", "tests", "dashboard")
    pub area: String,

    /// Human-readable message
    pub message: String,

    /// When the entry was written
    pub timestamp: DateTime<Utc>,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Correlation ID of the execution context this entry belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl LogEntry {
    /// Create a new uncorrelated log entry stamped with the current time.
    pub fn new(level: LogLevel, area: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            area: area.into(),
            message: message.into(),
            timestamp: Utc::now(),
            data: None,
            context_id: None,
        }
    }

    /// Attach a structured payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a correlation ID.
    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}

/// Lifecycle state of an execution context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    #[default]
    Running,
    Success,
    Failure,
}

impl ContextStatus {
    /// Returns true once the context has been completed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContextStatus::Running)
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextStatus::Running => "running",
            ContextStatus::Success => "success",
            ContextStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Correlation unit tracking start/end/status of one traced operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Unique correlation ID (e.g., "ctx-6f1c...")
    pub id: String,

    /// Feature this operation belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,

    /// Test being executed, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    /// Wall-clock start time
    pub start_time: DateTime<Utc>,

    /// Wall-clock end time, set on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Current status
    #[serde(default)]
    pub status: ContextStatus,

    /// Free-form data merged in by the caller
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,

    /// Number of steps logged against this context
    #[serde(default)]
    pub steps: usize,

    /// Elapsed time in milliseconds, set on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    /// Monotonic start instant used for duration measurement
    #[serde(skip)]
    pub started: Option<Instant>,
}

impl ExecutionContext {
    /// Create a running context with the given ID.
    pub fn new(id: String, feature: Option<String>, test_id: Option<String>) -> Self {
        Self {
            id,
            feature,
            test_id,
            start_time: Utc::now(),
            end_time: None,
            status: ContextStatus::Running,
            data: BTreeMap::new(),
            steps: 0,
            duration_ms: None,
            started: Some(Instant::now()),
        }
    }
}

/// Status of a single feature test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    NotStarted,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::NotStarted => "not_started",
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }

    /// Returns true if the test has finished a run (passed, failed, or skipped).
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TestStatus::Passed | TestStatus::Failed | TestStatus::Skipped
        )
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of the latest run of a feature test. One per test id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureTestResult {
    /// Test ID
    pub id: String,

    /// Test name
    pub name: String,

    /// Test description
    #[serde(default)]
    pub description: String,

    /// Outcome
    pub status: TestStatus,

    /// Human-readable reason for any non-passed status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: f64,

    /// When the result was recorded
    pub timestamp: DateTime<Utc>,

    /// Execution context the run was traced under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl FeatureTestResult {
    /// Create a result with the given status and no error.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        status: TestStatus,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            status,
            error: None,
            duration_ms: 0.0,
            timestamp: Utc::now(),
            context_id: None,
        }
    }

    /// Attach an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Outcome of a single endpoint probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTestResult {
    /// Probe name (the endpoint check's test id)
    pub endpoint: String,

    /// HTTP method
    pub method: String,

    /// Full request URL
    pub url: String,

    /// Status code returned, if a response arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Status code the probe expected
    pub expected_status: u16,

    /// Whether the probe passed
    pub success: bool,

    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: f64,

    /// Transport or expectation error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the probe finished
    pub timestamp: DateTime<Utc>,

    /// First part of the response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
}

/// A named, independently verifiable unit of product functionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Unique feature name (e.g., "dashboard-stats")
    pub name: String,

    /// Functional area used for structural test matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Feature {
    /// Create a feature with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            area: None,
            description: None,
        }
    }

    /// Set the functional area.
    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Manual verification flags for a feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVerification {
    /// Manually marked as implemented
    #[serde(default)]
    pub implemented: bool,

    /// Manually marked as tested
    #[serde(default)]
    pub tested: bool,

    /// When a human last verified the feature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,

    /// Ordered verification notes
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Serializable view of a registered feature test (without its body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureTestInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub area: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_name: Option<String>,
}

/// Which mapping tier associated a test with its feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// The test declared its feature explicitly
    Explicit,
    /// The curated feature/test table
    Catalog,
    /// Feature area equals test area
    Area,
    /// Normalized name containment
    Fuzzy,
    /// Relaxed area comparison on the second pass
    Fallback,
    /// Nothing matched; bucketed into "Other Features"
    Unmatched,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchTier::Explicit => "explicit",
            MatchTier::Catalog => "catalog",
            MatchTier::Area => "area",
            MatchTier::Fuzzy => "fuzzy",
            MatchTier::Fallback => "fallback",
            MatchTier::Unmatched => "unmatched",
        };
        write!(f, "{}", s)
    }
}

/// Aggregated test status of a feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTestStatus {
    #[default]
    NotTested,
    Passed,
    Failed,
    PartiallyPassed,
    Skipped,
}

impl FeatureTestStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureTestStatus::NotTested => "not_tested",
            FeatureTestStatus::Passed => "passed",
            FeatureTestStatus::Failed => "failed",
            FeatureTestStatus::PartiallyPassed => "partially_passed",
            FeatureTestStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for FeatureTestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a feature is considered implemented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationSource {
    /// Marked implemented by hand
    Manual,
    /// Inferred from all mapped tests passing
    Tests,
    /// Not implemented
    #[default]
    None,
}

impl fmt::Display for ImplementationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImplementationSource::Manual => "manual",
            ImplementationSource::Tests => "tests",
            ImplementationSource::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// Status of one mapped test inside an enhanced feature view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedTestStatus {
    pub id: String,
    pub name: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-status counts of a feature's mapped tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_run: usize,
}

/// Derived, read-only view of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedFeatureStatus {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub implemented: bool,
    pub implementation_source: ImplementationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implemented_at: Option<DateTime<Utc>>,
    pub tested: bool,
    pub test_status: FeatureTestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested: Option<DateTime<Utc>>,
    pub counts: TestCounts,
    pub tests: Vec<MappedTestStatus>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Aggregate outcome of a `run_all`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: f64,
    pub results: Vec<FeatureTestResult>,
}

impl RunSummary {
    /// Build a summary from results in execution order.
    pub fn from_results(results: Vec<FeatureTestResult>, duration_ms: f64) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
            duration_ms,
            results,
        }
    }
}
