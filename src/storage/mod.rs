//! Bounded in-memory log store for Featurelens.
//!
//! The store holds four collections:
//! - generic log entries (bounded, newest first, oldest dropped on overflow)
//! - feature test results (one slot per test id, overwritten on rerun)
//! - endpoint probe results (bounded, newest first)
//! - manual feature verifications (one slot per feature name)
//!
//! The whole store can be exported to a single serializable snapshot and
//! re-imported. The snapshot is also what gets written to the data directory
//! (`debug-store.json`) so results survive between CLI invocations.

use crate::models::{ApiTestResult, FeatureTestResult, FeatureVerification, LogEntry, LogLevel};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of generic log entries retained.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Default number of endpoint probe results retained.
pub const DEFAULT_API_RESULT_CAPACITY: usize = 100;

/// File name of the persisted snapshot inside the data directory.
pub const STORE_FILE: &str = "debug-store.json";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FL_DATA_DIR";

#[cfg(test)]
thread_local! {
    static DATA_DIR_OVERRIDE: std::cell::RefCell<Option<PathBuf>> =
        const { std::cell::RefCell::new(None) };
}

/// Override the data directory for the current test thread.
#[cfg(test)]
pub(crate) fn set_data_dir_override(path: PathBuf) {
    DATA_DIR_OVERRIDE.with(|cell| *cell.borrow_mut() = Some(path));
}

#[cfg(test)]
pub(crate) fn clear_data_dir_override() {
    DATA_DIR_OVERRIDE.with(|cell| *cell.borrow_mut() = None);
}

#[cfg(test)]
fn data_dir_override() -> Option<PathBuf> {
    DATA_DIR_OVERRIDE.with(|cell| cell.borrow().clone())
}

#[cfg(not(test))]
fn data_dir_override() -> Option<PathBuf> {
    None
}

/// Resolve the data directory.
///
/// Priority: explicit path > test override > `FL_DATA_DIR` > `~/.local/share/featurelens`
pub fn get_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = data_dir_override() {
        return Ok(path);
    }
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let base = dirs::data_local_dir()
        .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;
    Ok(base.join("featurelens"))
}

/// Path of the persisted snapshot inside `data_dir`.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

/// Serializable form of the whole store.
///
/// Layout: `{logs: LogEntry[], featureTestResults: {id: FeatureTestResult},
/// apiTestResults: ApiTestResult[], featureVerifications: {name: FeatureVerification}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub feature_test_results: BTreeMap<String, FeatureTestResult>,
    #[serde(default)]
    pub api_test_results: Vec<ApiTestResult>,
    #[serde(default)]
    pub feature_verifications: BTreeMap<String, FeatureVerification>,
}

/// Filter applied to generic log queries. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    /// Minimum level, inclusive
    pub min_level: Option<LogLevel>,
    /// Exact area
    pub area: Option<String>,
    /// Inclusive lower time bound
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper time bound
    pub to: Option<DateTime<Utc>>,
    /// Only entries correlated to this context
    pub context_id: Option<String>,
    /// Maximum number of entries returned (newest first)
    pub limit: Option<usize>,
}

impl LogFilter {
    /// Create a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether an entry passes every set criterion.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(level) = self.min_level {
            if entry.level < level {
                return false;
            }
        }
        if let Some(ref area) = self.area {
            if &entry.area != area {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        if let Some(ref ctx) = self.context_id {
            if entry.context_id.as_deref() != Some(ctx.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Parse a lower date bound. A bare date (`YYYY-MM-DD`) means start of day.
pub fn parse_from_bound(s: &str) -> Result<DateTime<Utc>> {
    parse_bound(s, false)
}

/// Parse an upper date bound. A bare date (`YYYY-MM-DD`) means end of day (23:59:59.999).
pub fn parse_to_bound(s: &str) -> Result<DateTime<Utc>> {
    parse_bound(s, true)
}

fn parse_bound(s: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default()
        } else {
            NaiveTime::default()
        };
        return Ok(Utc.from_utc_datetime(&date.and_time(time)));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("Invalid date '{}': {}", s, e)))
}

/// Bounded collections of logs and test results.
#[derive(Debug, Clone)]
pub struct LogStore {
    logs: VecDeque<LogEntry>,
    feature_test_results: BTreeMap<String, FeatureTestResult>,
    api_test_results: VecDeque<ApiTestResult>,
    feature_verifications: BTreeMap<String, FeatureVerification>,
    log_capacity: usize,
    api_capacity: usize,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    /// Create a store with the default capacities.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY, DEFAULT_API_RESULT_CAPACITY)
    }

    /// Create a store with explicit capacities. Zero capacities are raised to one.
    pub fn with_capacity(log_capacity: usize, api_capacity: usize) -> Self {
        let log_capacity = log_capacity.max(1);
        let api_capacity = api_capacity.max(1);
        Self {
            logs: VecDeque::with_capacity(log_capacity.min(DEFAULT_LOG_CAPACITY)),
            feature_test_results: BTreeMap::new(),
            api_test_results: VecDeque::with_capacity(api_capacity.min(DEFAULT_API_RESULT_CAPACITY)),
            feature_verifications: BTreeMap::new(),
            log_capacity,
            api_capacity,
        }
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    pub fn api_capacity(&self) -> usize {
        self.api_capacity
    }

    // === Generic Logs ===

    /// Append a log entry, evicting the oldest entry when full.
    pub fn add_log(&mut self, entry: LogEntry) {
        self.logs.push_front(entry);
        self.logs.truncate(self.log_capacity);
    }

    /// Get log entries matching `filter`, newest first.
    pub fn get_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let matching = self.logs.iter().filter(|e| filter.matches(e)).cloned();
        match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    // === Feature Test Results ===

    /// Record a test result, replacing any previous result for the same id.
    pub fn add_feature_test_result(&mut self, result: FeatureTestResult) {
        self.feature_test_results.insert(result.id.clone(), result);
    }

    pub fn get_feature_test_result(&self, id: &str) -> Option<&FeatureTestResult> {
        self.feature_test_results.get(id)
    }

    /// All test results, ordered by test id.
    pub fn get_feature_test_results(&self) -> Vec<FeatureTestResult> {
        self.feature_test_results.values().cloned().collect()
    }

    pub fn remove_feature_test_result(&mut self, id: &str) -> Option<FeatureTestResult> {
        self.feature_test_results.remove(id)
    }

    pub fn clear_feature_test_results(&mut self) {
        self.feature_test_results.clear();
    }

    // === Endpoint Probe Results ===

    /// Append a probe result, evicting the oldest result when full.
    pub fn add_api_test_result(&mut self, result: ApiTestResult) {
        self.api_test_results.push_front(result);
        self.api_test_results.truncate(self.api_capacity);
    }

    /// Probe results, newest first.
    pub fn get_api_test_results(&self, limit: Option<usize>) -> Vec<ApiTestResult> {
        let limit = limit.unwrap_or(self.api_test_results.len());
        self.api_test_results.iter().take(limit).cloned().collect()
    }

    pub fn clear_api_test_results(&mut self) {
        self.api_test_results.clear();
    }

    // === Feature Verifications ===

    pub fn get_feature_verification(&self, name: &str) -> Option<&FeatureVerification> {
        self.feature_verifications.get(name)
    }

    /// The verification slot for `name`, created empty on first use.
    pub fn feature_verification_mut(&mut self, name: &str) -> &mut FeatureVerification {
        self.feature_verifications
            .entry(name.to_string())
            .or_default()
    }

    /// Manual verifications, ordered by feature name.
    pub fn get_feature_verifications(&self) -> &BTreeMap<String, FeatureVerification> {
        &self.feature_verifications
    }

    /// Clear logs, test results, and probe results.
    ///
    /// Manual verifications are kept.
    pub fn clear_all(&mut self) {
        self.clear_logs();
        self.clear_feature_test_results();
        self.clear_api_test_results();
    }

    // === Import / Export ===

    /// Snapshot the whole store.
    pub fn export(&self) -> StoreSnapshot {
        StoreSnapshot {
            logs: self.logs.iter().cloned().collect(),
            feature_test_results: self.feature_test_results.clone(),
            api_test_results: self.api_test_results.iter().cloned().collect(),
            feature_verifications: self.feature_verifications.clone(),
        }
    }

    /// Snapshot the whole store as pretty JSON.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// Replace the store's contents with an exported snapshot.
    ///
    /// Returns false without touching the store if the payload is malformed.
    /// The only structural requirement is that `logs` is an array; timestamp
    /// strings are parsed back into timestamps.
    pub fn import(&mut self, blob: &serde_json::Value) -> bool {
        match blob.get("logs") {
            Some(logs) if logs.is_array() => {}
            _ => {
                tracing::warn!("Rejected store import: `logs` must be an array");
                return false;
            }
        }

        match serde_json::from_value::<StoreSnapshot>(blob.clone()) {
            Ok(snapshot) => {
                self.replace(snapshot);
                true
            }
            Err(e) => {
                tracing::warn!("Rejected store import: {}", e);
                false
            }
        }
    }

    /// Parse `json` and import it. Returns false on any parse or shape error.
    pub fn import_str(&mut self, json: &str) -> bool {
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(blob) => self.import(&blob),
            Err(e) => {
                tracing::warn!("Rejected store import: {}", e);
                false
            }
        }
    }

    fn replace(&mut self, snapshot: StoreSnapshot) {
        let mut logs: VecDeque<LogEntry> = snapshot.logs.into();
        logs.truncate(self.log_capacity);
        let mut api: VecDeque<ApiTestResult> = snapshot.api_test_results.into();
        api.truncate(self.api_capacity);

        self.logs = logs;
        self.feature_test_results = snapshot.feature_test_results;
        self.api_test_results = api;
        self.feature_verifications = snapshot.feature_verifications;
    }

    // === Persistence ===

    /// Write the snapshot to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("Could not create {}: {}", parent.display(), e))
            })?;
        }
        let json = self.export_json()?;
        fs::write(path, json)
            .map_err(|e| Error::Persistence(format!("Could not write {}: {}", path.display(), e)))
    }

    /// Load a snapshot previously written by [`LogStore::save`].
    ///
    /// Returns `Ok(false)` if the file does not exist. A file that cannot be
    /// parsed is an error and leaves the store untouched.
    pub fn load(&mut self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Persistence(format!("Could not read {}: {}", path.display(), e)))?;
        if self.import_str(&content) {
            Ok(true)
        } else {
            Err(Error::Persistence(format!(
                "Corrupt store file: {}",
                path.display()
            )))
        }
    }
}
