//! Command implementations for the Featurelens CLI.
//!
//! Every command builds a [`DebugService`] from config.kdl plus the persisted
//! debug store, does its work, and saves the store back when it changed
//! anything. Results implement [`Output`] so `main` can print them as JSON or
//! for humans.

use crate::config::{
    self, ConfigLocation, ConfigOverrides, DEFAULT_BASE_URL, FeaturelensConfig, ResolvedSettings,
};
use crate::mapping::catalog::{self, GOAL_TRACKER_CATALOG};
use crate::models::{
    ApiTestResult, EnhancedFeatureStatus, FeatureTestInfo, FeatureTestResult, LogEntry, LogLevel,
    RunSummary,
};
use crate::query::{self, DebugQuery};
use crate::runner::endpoint::EndpointCheck;
use crate::service::{DebugService, FeatureDetail};
use crate::storage::{self, DEFAULT_API_RESULT_CAPACITY, DEFAULT_LOG_CAPACITY, LogFilter};
use crate::tracer::DEFAULT_CONTEXT_CAPACITY;
use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_or_error<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
}

/// Resolved locations for one CLI invocation.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub data_dir: PathBuf,
    pub config_location: ConfigLocation,
    /// None when the optional default config.kdl does not exist
    pub config: Option<FeaturelensConfig>,
}

impl Workspace {
    /// Resolve the data dir and load config.kdl.
    pub fn open(data_dir: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let mut ws = Self::locate(data_dir, config_path)?;
        ws.config = config::load_config(&ws.config_location)?;
        Ok(ws)
    }

    /// Resolve locations without reading config.kdl.
    pub fn locate(data_dir: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let data_dir = storage::get_data_dir(data_dir)?;
        let config_location = config::locate_config(config_path, &data_dir);
        Ok(Self {
            data_dir,
            config_location,
            config: None,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        storage::store_path(&self.data_dir)
    }

    fn config_or_default(&self) -> FeaturelensConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Resolve settings against the loaded config and the process environment.
    pub fn settings(&self, overrides: &ConfigOverrides) -> Result<ResolvedSettings> {
        let path = self
            .config
            .as_ref()
            .map(|_| self.config_location.path.as_path());
        config::resolve_settings(&self.config_or_default(), path, overrides)
    }

    /// Build a service with catalog and configured features, endpoint tests,
    /// and (when `load_store` is set) the persisted store.
    pub fn service(&self, overrides: &ConfigOverrides, load_store: bool) -> Result<DebugService> {
        let settings = self.settings(overrides)?;
        let config = self.config_or_default();
        let mut service = DebugService::with_options(settings.service_options());

        for feature in catalog::features(GOAL_TRACKER_CATALOG) {
            service.register_feature(feature)?;
        }
        for feature in config.features {
            service.register_feature(feature)?;
        }
        for endpoint in config.endpoints {
            service.register_endpoint(endpoint, settings.base_url())?;
        }

        if load_store {
            service.load(&self.store_path())?;
        }
        Ok(service)
    }

    fn save(&self, service: &DebugService) -> Result<()> {
        service.save(&self.store_path())
    }
}

// === run ===

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RunOutput {
    Single(FeatureTestResult),
    All(RunSummary),
}

fn result_line(result: &FeatureTestResult) -> String {
    let mut line = format!(
        "[{}] {} ({:.1}ms)",
        result.status.as_str().to_uppercase(),
        result.id,
        result.duration_ms
    );
    if let Some(ref error) = result.error {
        line.push_str(&format!(" - {}", error));
    }
    line
}

impl Output for RunOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        match self {
            RunOutput::Single(result) => result_line(result),
            RunOutput::All(summary) => {
                if summary.total == 0 {
                    return "No tests configured. Add endpoint nodes to config.kdl.".to_string();
                }
                let mut lines: Vec<String> = summary.results.iter().map(result_line).collect();
                lines.push(String::new());
                lines.push(format!(
                    "{} tests: {} passed, {} failed, {} skipped ({:.1}ms)",
                    summary.total,
                    summary.passed,
                    summary.failed,
                    summary.skipped,
                    summary.duration_ms
                ));
                lines.join("\n")
            }
        }
    }
}

/// Run one test (or all of them) and persist the outcome.
pub async fn run(ws: &Workspace, id: Option<&str>, overrides: &ConfigOverrides) -> Result<RunOutput> {
    let mut service = ws.service(overrides, true)?;
    let output = match id {
        Some(id) => {
            if !service.get_feature_tests().iter().any(|t| t.id == id) {
                return Err(Error::NotFound(format!("Test not found: {}", id)));
            }
            RunOutput::Single(service.run_test(id).await)
        }
        None => RunOutput::All(service.run_all().await),
    };
    ws.save(&service)?;
    Ok(output)
}

// === features ===

#[derive(Serialize)]
pub struct FeaturesOutput {
    pub count: usize,
    pub features: Vec<EnhancedFeatureStatus>,
}

impl Output for FeaturesOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        if self.features.is_empty() {
            return "No features.".to_string();
        }
        let mut lines = vec![format!("{} feature(s):", self.count)];
        for feature in &self.features {
            let mark = if feature.implemented { "x" } else { " " };
            lines.push(format!(
                "  [{}] {} - {} ({}/{} passed)",
                mark,
                feature.name,
                feature.test_status,
                feature.counts.passed,
                feature.counts.total
            ));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct FeatureDetailOutput(pub FeatureDetail);

impl Output for FeatureDetailOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let detail = &self.0;
        let feature = &detail.feature;
        let mut lines = vec![feature.name.clone()];
        if let Some(ref area) = feature.area {
            lines.push(format!("  Area: {}", area));
        }
        if let Some(ref description) = feature.description {
            lines.push(format!("  Description: {}", description));
        }
        lines.push(format!(
            "  Implemented: {} ({})",
            if feature.implemented { "yes" } else { "no" },
            feature.implementation_source
        ));
        lines.push(format!("  Test status: {}", feature.test_status));
        if !feature.tests.is_empty() {
            lines.push("  Tests:".to_string());
            for test in &feature.tests {
                lines.push(format!("    {} [{}]", test.id, test.status));
            }
        }
        if !detail.logs.is_empty() {
            lines.push("  Recent logs:".to_string());
            for entry in &detail.logs {
                lines.push(format!("    {}", log_line(entry)));
            }
        }
        lines.join("\n")
    }
}

pub fn features_list(ws: &Workspace) -> Result<FeaturesOutput> {
    let service = ws.service(&ConfigOverrides::new(), true)?;
    let features = service.get_enhanced_features();
    Ok(FeaturesOutput {
        count: features.len(),
        features,
    })
}

pub fn feature_show(ws: &Workspace, name: &str, log_limit: usize) -> Result<FeatureDetailOutput> {
    let service = ws.service(&ConfigOverrides::new(), true)?;
    Ok(FeatureDetailOutput(service.get_feature_detail(name, log_limit)?))
}

#[derive(Serialize)]
pub struct MarkOutput {
    pub feature: EnhancedFeatureStatus,
}

impl Output for MarkOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let feature = &self.feature;
        format!(
            "Marked {}: implemented={} ({}), tested={}",
            feature.name,
            if feature.implemented { "yes" } else { "no" },
            feature.implementation_source,
            if feature.tested { "yes" } else { "no" }
        )
    }
}

/// Record manual verification flags for a registered feature.
pub fn mark(
    ws: &Workspace,
    name: &str,
    implemented: Option<bool>,
    tested: Option<bool>,
    note: Option<&str>,
) -> Result<MarkOutput> {
    if implemented.is_none() && tested.is_none() && note.is_none() {
        return Err(Error::Validation(
            "Nothing to mark: pass --implemented, --tested, or --note".to_string(),
        ));
    }

    let mut service = ws.service(&ConfigOverrides::new(), true)?;
    match implemented {
        Some(implemented) => service.mark_implemented(name, implemented, note)?,
        None => {
            if let Some(note) = note {
                service.add_feature_note(name, note)?;
            }
        }
    }
    if let Some(tested) = tested {
        service.mark_tested(name, tested)?;
    }
    ws.save(&service)?;

    Ok(MarkOutput {
        feature: service.get_enhanced_feature(name)?,
    })
}

// === tests / results ===

#[derive(Serialize)]
pub struct TestsOutput {
    pub count: usize,
    pub tests: Vec<FeatureTestInfo>,
}

impl Output for TestsOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        if self.tests.is_empty() {
            return "No tests configured.".to_string();
        }
        let mut lines = vec![format!("{} test(s):", self.count)];
        for test in &self.tests {
            let mut line = format!("  {} - {} [{}]", test.id, test.name, test.area);
            if !test.dependencies.is_empty() {
                line.push_str(&format!(" (depends on {})", test.dependencies.join(", ")));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

pub fn tests(ws: &Workspace) -> Result<TestsOutput> {
    let service = ws.service(&ConfigOverrides::new(), false)?;
    let tests = service.get_feature_tests();
    Ok(TestsOutput {
        count: tests.len(),
        tests,
    })
}

#[derive(Serialize)]
pub struct ResultsOutput {
    pub count: usize,
    pub results: Vec<FeatureTestResult>,
}

impl Output for ResultsOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        if self.results.is_empty() {
            return "No results yet. Run `fl run` first.".to_string();
        }
        self.results
            .iter()
            .map(result_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn results(ws: &Workspace) -> Result<ResultsOutput> {
    let service = ws.service(&ConfigOverrides::new(), true)?;
    let results = service.get_test_results();
    Ok(ResultsOutput {
        count: results.len(),
        results,
    })
}

// === report ===

#[derive(Serialize)]
pub struct ReportOutput {
    pub report: String,
}

impl Output for ReportOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        self.report.clone()
    }
}

pub fn report(ws: &Workspace) -> Result<ReportOutput> {
    let service = ws.service(&ConfigOverrides::new(), true)?;
    Ok(ReportOutput {
        report: service.generate_test_report(),
    })
}

// === logs / api ===

/// Filters accepted by `fl logs`, as raw CLI strings.
#[derive(Debug, Clone, Default)]
pub struct LogsArgs {
    pub level: Option<String>,
    pub area: Option<String>,
    pub context: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}

impl LogsArgs {
    fn to_filter(&self) -> Result<LogFilter> {
        let mut filter = LogFilter::new();
        if let Some(ref level) = self.level {
            let level: LogLevel = level.parse().map_err(Error::Validation)?;
            filter = filter.min_level(level);
        }
        if let Some(ref area) = self.area {
            filter = filter.area(area);
        }
        if let Some(ref context) = self.context {
            filter = filter.context(context);
        }
        if let Some(ref from) = self.from {
            filter = filter.from(storage::parse_from_bound(from)?);
        }
        if let Some(ref to) = self.to {
            filter = filter.to(storage::parse_to_bound(to)?);
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        Ok(filter)
    }
}

fn log_line(entry: &LogEntry) -> String {
    format!(
        "{} {:<5} [{}] {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.level.as_str().to_uppercase(),
        entry.area,
        entry.message
    )
}

#[derive(Serialize)]
pub struct LogsOutput {
    pub count: usize,
    pub logs: Vec<LogEntry>,
}

impl Output for LogsOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        if self.logs.is_empty() {
            return "No log entries.".to_string();
        }
        self.logs.iter().map(log_line).collect::<Vec<_>>().join("\n")
    }
}

pub fn logs(ws: &Workspace, args: &LogsArgs) -> Result<LogsOutput> {
    let filter = args.to_filter()?;
    let service = ws.service(&ConfigOverrides::new(), true)?;
    let logs = service.get_logs(&filter);
    Ok(LogsOutput {
        count: logs.len(),
        logs,
    })
}

#[derive(Serialize)]
pub struct ApiResultsOutput {
    pub count: usize,
    pub results: Vec<ApiTestResult>,
}

impl Output for ApiResultsOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        if self.results.is_empty() {
            return "No endpoint probes recorded.".to_string();
        }
        self.results
            .iter()
            .map(|r| {
                let status = r
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "---".to_string());
                let mark = if r.success { "ok" } else { "FAIL" };
                format!("{:<4} {} {} -> {} ({:.1}ms)", mark, r.method, r.url, status, r.duration_ms)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn api_results(ws: &Workspace, limit: Option<usize>) -> Result<ApiResultsOutput> {
    let service = ws.service(&ConfigOverrides::new(), true)?;
    let results = service.get_api_test_results(limit);
    Ok(ApiResultsOutput {
        count: results.len(),
        results,
    })
}

// === query ===

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct QueryOutput(pub serde_json::Value);

impl Output for QueryOutput {
    fn to_json(&self) -> String {
        self.0.to_string()
    }

    fn to_human(&self) -> String {
        match self.0.get("report").and_then(|r| r.as_str()) {
            Some(report) => report.to_string(),
            None => serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string()),
        }
    }
}

/// Execute an allow-listed query. Queries that run tests persist the store.
pub async fn query(ws: &Workspace, raw: &str) -> Result<QueryOutput> {
    let parsed: DebugQuery = raw.parse()?;
    let mut service = ws.service(&ConfigOverrides::new(), true)?;
    let value = query::execute_query(&mut service, &parsed).await?;
    if parsed.is_mutating() {
        ws.save(&service)?;
    }
    Ok(QueryOutput(value))
}

// === export / import / clear ===

#[derive(Serialize)]
#[serde(untagged)]
pub enum ExportOutput {
    Stdout(storage::StoreSnapshot),
    File {
        path: PathBuf,
        logs: usize,
        results: usize,
        #[serde(rename = "apiResults")]
        api_results: usize,
    },
}

impl Output for ExportOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        match self {
            ExportOutput::Stdout(snapshot) => {
                serde_json::to_string_pretty(snapshot).unwrap_or_default()
            }
            ExportOutput::File {
                path,
                logs,
                results,
                api_results,
            } => format!(
                "Exported {} log(s), {} result(s), {} probe(s) to {}",
                logs,
                results,
                api_results,
                path.display()
            ),
        }
    }
}

pub fn export(ws: &Workspace, path: Option<&Path>) -> Result<ExportOutput> {
    let service = ws.service(&ConfigOverrides::new(), true)?;
    let snapshot = service.export();
    match path {
        None => Ok(ExportOutput::Stdout(snapshot)),
        Some(path) => {
            fs::write(path, service.export_json()?)?;
            Ok(ExportOutput::File {
                path: path.to_path_buf(),
                logs: snapshot.logs.len(),
                results: snapshot.feature_test_results.len(),
                api_results: snapshot.api_test_results.len(),
            })
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutput {
    pub imported: bool,
    pub logs: usize,
    pub results: usize,
}

impl Output for ImportOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        format!("Imported {} log(s) and {} result(s)", self.logs, self.results)
    }
}

/// Replace the persisted store with a snapshot file.
pub fn import(ws: &Workspace, path: &Path) -> Result<ImportOutput> {
    let content = fs::read_to_string(path)?;
    let blob: serde_json::Value = serde_json::from_str(&content)?;
    let mut service = ws.service(&ConfigOverrides::new(), false)?;
    if !service.import(&blob) {
        return Err(Error::Validation(format!(
            "Not a debug store snapshot: {}",
            path.display()
        )));
    }
    ws.save(&service)?;
    let snapshot = service.export();
    Ok(ImportOutput {
        imported: true,
        logs: snapshot.logs.len(),
        results: snapshot.feature_test_results.len(),
    })
}

#[derive(Serialize)]
pub struct ClearOutput {
    pub cleared: Vec<&'static str>,
}

impl Output for ClearOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        format!("Cleared {}", self.cleared.join(", "))
    }
}

/// Clear parts of the store. No flags clears every collection and also
/// replaces a corrupt store file. Manual verifications are kept.
pub fn clear(ws: &Workspace, logs: bool, results: bool, api: bool) -> Result<ClearOutput> {
    let everything = !logs && !results && !api;
    let mut service = ws.service(&ConfigOverrides::new(), false)?;
    match service.load(&ws.store_path()) {
        Ok(_) => {}
        Err(e) if everything => {
            tracing::warn!("Discarding unreadable store: {}", e);
        }
        Err(e) => return Err(e),
    }
    let mut cleared = Vec::new();
    if everything {
        service.clear_all();
        cleared.extend(["logs", "results", "api"]);
    } else {
        if logs {
            service.clear_logs();
            cleared.push("logs");
        }
        if results {
            service.clear_test_results();
            cleared.push("results");
        }
        if api {
            service.clear_api_results();
            cleared.push("api");
        }
    }
    ws.save(&service)?;
    Ok(ClearOutput { cleared })
}

// === config ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigShowOutput {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub config_exists: bool,
    pub store_path: PathBuf,
    pub settings: ResolvedSettings,
    pub features: usize,
    pub endpoints: usize,
}

impl Output for ConfigShowOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let s = &self.settings;
        let mut lines = vec![
            format!("Data dir: {}", self.data_dir.display()),
            format!(
                "Config: {}{}",
                self.config_path.display(),
                if self.config_exists { "" } else { " (not found, using defaults)" }
            ),
            format!("Store: {}", self.store_path.display()),
            String::new(),
        ];
        lines.push(format!("log-capacity = {} ({})", s.log_capacity.value, s.log_capacity.source));
        lines.push(format!(
            "api-result-capacity = {} ({})",
            s.api_result_capacity.value, s.api_result_capacity.source
        ));
        lines.push(format!(
            "context-capacity = {} ({})",
            s.context_capacity.value, s.context_capacity.source
        ));
        lines.push(format!(
            "test-timeout-ms = {} ({})",
            s.test_timeout_ms.value, s.test_timeout_ms.source
        ));
        lines.push(format!("base-url = {} ({})", s.base_url.value, s.base_url.source));
        lines.push(String::new());
        lines.push(format!("{} feature(s), {} endpoint(s) configured", self.features, self.endpoints));
        lines.join("\n")
    }
}

pub fn config_show(ws: &Workspace, overrides: &ConfigOverrides) -> Result<ConfigShowOutput> {
    let settings = ws.settings(overrides)?;
    let config = ws.config_or_default();
    Ok(ConfigShowOutput {
        data_dir: ws.data_dir.clone(),
        config_path: ws.config_location.path.clone(),
        config_exists: ws.config.is_some(),
        store_path: ws.store_path(),
        settings,
        features: config.features.len(),
        endpoints: config.endpoints.len(),
    })
}

#[derive(Serialize)]
pub struct ConfigInitOutput {
    pub path: PathBuf,
    pub written: bool,
}

impl Output for ConfigInitOutput {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        format!("Wrote {}", self.path.display())
    }
}

/// A starter config with explicit defaults and a single health probe.
pub fn starter_config() -> FeaturelensConfig {
    let mut health = EndpointCheck::new("api-health-check", "/api/health");
    health.feature = Some("api-health".to_string());
    FeaturelensConfig {
        log_capacity: Some(DEFAULT_LOG_CAPACITY),
        api_result_capacity: Some(DEFAULT_API_RESULT_CAPACITY),
        context_capacity: Some(DEFAULT_CONTEXT_CAPACITY),
        test_timeout_ms: Some(crate::runner::DEFAULT_TEST_TIMEOUT.as_millis() as u64),
        base_url: Some(DEFAULT_BASE_URL.to_string()),
        features: Vec::new(),
        endpoints: vec![health],
    }
}

pub fn config_init(ws: &Workspace, force: bool) -> Result<ConfigInitOutput> {
    let path = ws.config_location.path.clone();
    if path.exists() && !force {
        return Err(Error::Validation(format!(
            "Config already exists: {} (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, starter_config().render())?;
    Ok(ConfigInitOutput {
        path,
        written: true,
    })
}
