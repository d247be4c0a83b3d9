//! Execution context tracing.
//!
//! A context is a correlation unit for one traced operation (a test run, an
//! API call sequence, ...). Every log line written through the tracer carries
//! the context's ID so the whole operation can be reassembled from the store
//! later with [`LogFilter::context`](crate::storage::LogFilter::context).
//!
//! Contexts move from running to success or failure exactly once.

pub mod diff;
pub mod sanitize;

use crate::models::{ContextStatus, ExecutionContext, LogEntry, LogLevel};
use crate::storage::LogStore;
use crate::{Error, Result};
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};

pub use diff::{Difference, find_differences};
pub use sanitize::sanitize;

/// Area used for the tracer's own lifecycle entries.
pub const TRACER_AREA: &str = "tracer";

/// Completed contexts kept before the oldest are pruned.
pub const DEFAULT_CONTEXT_CAPACITY: usize = 100;

/// Tracks execution contexts and writes correlated entries into a [`LogStore`].
///
/// At most `capacity` completed contexts are retained; running contexts do
/// not count against it.
#[derive(Debug)]
pub struct Tracer {
    contexts: HashMap<String, ExecutionContext>,
    /// Context IDs in creation order
    order: Vec<String>,
    capacity: usize,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CONTEXT_CAPACITY)
    }
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            contexts: HashMap::new(),
            order: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open a new running context and log that it started.
    pub fn create_context(
        &mut self,
        store: &mut LogStore,
        feature: Option<&str>,
        test_id: Option<&str>,
    ) -> String {
        let id = format!("ctx-{}", uuid::Uuid::new_v4());
        let ctx = ExecutionContext::new(
            id.clone(),
            feature.map(str::to_string),
            test_id.map(str::to_string),
        );

        tracing::debug!(context = %id, feature = ?feature, test = ?test_id, "context started");
        store.add_log(
            LogEntry::new(
                LogLevel::Debug,
                feature.unwrap_or(TRACER_AREA),
                format!("Context started: {}", id),
            )
            .with_data(json!({"feature": feature, "testId": test_id}))
            .with_context(&id),
        );

        self.contexts.insert(id.clone(), ctx);
        self.order.push(id.clone());
        id
    }

    /// Append a correlated entry and bump the context's step count.
    ///
    /// Unknown or completed contexts do not fail the caller; a standalone
    /// warning is written instead.
    pub fn log_step(
        &mut self,
        store: &mut LogStore,
        context_id: &str,
        message: &str,
        level: LogLevel,
        area: &str,
        data: Option<Value>,
    ) {
        let Some(ctx) = self.contexts.get_mut(context_id) else {
            tracing::warn!(context = %context_id, "log_step on unknown context");
            let mut entry = LogEntry::new(
                LogLevel::Warn,
                area,
                format!("Unknown context {}: {}", context_id, message),
            );
            if let Some(data) = data {
                entry = entry.with_data(data);
            }
            store.add_log(entry);
            return;
        };

        if ctx.status.is_terminal() {
            tracing::warn!(context = %context_id, "log_step on completed context");
            store.add_log(
                LogEntry::new(
                    LogLevel::Warn,
                    area,
                    format!("Context {} already completed: {}", context_id, message),
                )
                .with_context(context_id),
            );
            return;
        }

        ctx.steps += 1;
        let mut entry = LogEntry::new(level, area, message).with_context(context_id);
        if let Some(data) = data {
            entry = entry.with_data(data);
        }
        store.add_log(entry);
    }

    /// Finish a context, merging `data` and recording its duration.
    ///
    /// Completing an already-completed context is a no-op.
    pub fn complete_context(
        &mut self,
        store: &mut LogStore,
        context_id: &str,
        success: bool,
        data: Option<BTreeMap<String, Value>>,
    ) -> Result<()> {
        let ctx = self
            .contexts
            .get_mut(context_id)
            .ok_or_else(|| Error::NotFound(format!("Context not found: {}", context_id)))?;

        if ctx.status.is_terminal() {
            return Ok(());
        }

        let end = Utc::now();
        let duration_ms = match ctx.started {
            Some(started) => started.elapsed().as_secs_f64() * 1000.0,
            None => (end - ctx.start_time).num_microseconds().unwrap_or(0) as f64 / 1000.0,
        };

        ctx.end_time = Some(end);
        ctx.status = if success {
            ContextStatus::Success
        } else {
            ContextStatus::Failure
        };
        ctx.duration_ms = Some(duration_ms);
        if let Some(data) = data {
            ctx.data.extend(data);
        }

        tracing::debug!(context = %context_id, status = %ctx.status, duration_ms, "context completed");
        store.add_log(
            LogEntry::new(
                if success { LogLevel::Info } else { LogLevel::Error },
                ctx.feature.as_deref().unwrap_or(TRACER_AREA),
                format!("Context {} completed: {}", context_id, ctx.status),
            )
            .with_data(json!({
                "status": ctx.status,
                "durationMs": duration_ms,
                "steps": ctx.steps,
                "testId": ctx.test_id,
                "data": ctx.data,
            }))
            .with_context(context_id),
        );

        let pruned = self.prune_completed(self.capacity);
        if pruned > 0 {
            tracing::debug!(pruned, capacity = self.capacity, "pruned completed contexts");
        }
        Ok(())
    }

    /// Log an outgoing API request. The body is sanitized.
    pub fn log_api_request(
        &mut self,
        store: &mut LogStore,
        context_id: &str,
        method: &str,
        url: &str,
        body: Option<&Value>,
    ) {
        let data = json!({
            "method": method,
            "url": url,
            "body": body.map(sanitize),
        });
        self.log_step(
            store,
            context_id,
            &format!("API request: {} {}", method, url),
            LogLevel::Debug,
            "api",
            Some(data),
        );
    }

    /// Log an API response. Responses with status >= 400 are logged as errors.
    pub fn log_api_response(
        &mut self,
        store: &mut LogStore,
        context_id: &str,
        status: u16,
        response_data: Option<&Value>,
        duration_ms: f64,
    ) {
        let level = if status >= 400 {
            LogLevel::Error
        } else {
            LogLevel::Debug
        };
        let data = json!({
            "status": status,
            "responseData": response_data.map(sanitize),
            "durationMs": duration_ms,
        });
        self.log_step(
            store,
            context_id,
            &format!("API response: {} ({:.1}ms)", status, duration_ms),
            level,
            "api",
            Some(data),
        );
    }

    /// Log the input a test is about to feed to the system under test.
    pub fn log_test_input(
        &mut self,
        store: &mut LogStore,
        context_id: &str,
        test_id: &str,
        input: &Value,
    ) {
        self.log_step(
            store,
            context_id,
            &format!("Test input: {}", test_id),
            LogLevel::Debug,
            "tests",
            Some(json!({"testId": test_id, "input": sanitize(input)})),
        );
    }

    /// Log a test's expected and actual output with their differences.
    ///
    /// Returns the differences so callers can decide pass/fail.
    pub fn log_test_output(
        &mut self,
        store: &mut LogStore,
        context_id: &str,
        test_id: &str,
        expected: &Value,
        actual: &Value,
    ) -> Vec<Difference> {
        let differences = find_differences(expected, actual);
        let (level, message) = if differences.is_empty() {
            (LogLevel::Debug, format!("Test output matches: {}", test_id))
        } else {
            (
                LogLevel::Warn,
                format!(
                    "Test output differs: {} ({} differences)",
                    test_id,
                    differences.len()
                ),
            )
        };
        self.log_step(
            store,
            context_id,
            &message,
            level,
            "tests",
            Some(json!({
                "testId": test_id,
                "expected": sanitize(expected),
                "actual": sanitize(actual),
                "differences": differences,
            })),
        );
        differences
    }

    pub fn get_context(&self, context_id: &str) -> Option<&ExecutionContext> {
        self.contexts.get(context_id)
    }

    /// All contexts, newest first.
    pub fn list_contexts(&self) -> Vec<&ExecutionContext> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.contexts.get(id))
            .collect()
    }

    /// Contexts still running, newest first.
    pub fn active_contexts(&self) -> Vec<&ExecutionContext> {
        self.list_contexts()
            .into_iter()
            .filter(|c| !c.status.is_terminal())
            .collect()
    }

    /// Drop the oldest completed contexts so that at most `keep` remain.
    ///
    /// Running contexts are never dropped. Returns the number removed.
    pub fn prune_completed(&mut self, keep: usize) -> usize {
        let completed: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                self.contexts
                    .get(*id)
                    .is_some_and(|c| c.status.is_terminal())
            })
            .cloned()
            .collect();

        let excess = completed.len().saturating_sub(keep);
        for id in &completed[..excess] {
            self.contexts.remove(id);
        }
        self.order.retain(|id| self.contexts.contains_key(id));
        excess
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
