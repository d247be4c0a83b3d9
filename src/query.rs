//! Allow-listed query dispatch.
//!
//! Bridges hand the service a query string such as
//! `getEnhancedFeature('dashboard-stats')`. The string is parsed into a
//! closed [`DebugQuery`]; anything outside the allow-list is rejected before
//! any work is done. Nothing is ever evaluated.

use crate::service::DebugService;
use crate::storage::LogFilter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Log entries returned by `getLogs` when no limit is given.
pub const QUERY_LOG_LIMIT: usize = 100;

/// Every query a bridge may issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "camelCase")]
pub enum DebugQuery {
    GetEnhancedFeatures,
    GetEnhancedFeature { name: String },
    GetFeatureTests,
    GetTestsForFeature { name: String },
    GetTestResults,
    RunTest { id: String },
    RunAllTests,
    GenerateTestReport,
    GetLogs { area: Option<String> },
}

impl DebugQuery {
    /// The allow-listed function names.
    pub const ALLOWED: &'static [&'static str] = &[
        "getEnhancedFeatures",
        "getEnhancedFeature",
        "getFeatureTests",
        "getTestsForFeature",
        "getTestResults",
        "runTest",
        "runAllTests",
        "generateTestReport",
        "getLogs",
    ];

    /// Whether executing this query runs tests.
    pub fn is_mutating(&self) -> bool {
        matches!(self, DebugQuery::RunTest { .. } | DebugQuery::RunAllTests)
    }
}

impl fmt::Display for DebugQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugQuery::GetEnhancedFeatures => write!(f, "getEnhancedFeatures()"),
            DebugQuery::GetEnhancedFeature { name } => write!(f, "getEnhancedFeature('{}')", name),
            DebugQuery::GetFeatureTests => write!(f, "getFeatureTests()"),
            DebugQuery::GetTestsForFeature { name } => write!(f, "getTestsForFeature('{}')", name),
            DebugQuery::GetTestResults => write!(f, "getTestResults()"),
            DebugQuery::RunTest { id } => write!(f, "runTest('{}')", id),
            DebugQuery::RunAllTests => write!(f, "runAllTests()"),
            DebugQuery::GenerateTestReport => write!(f, "generateTestReport()"),
            DebugQuery::GetLogs { area: None } => write!(f, "getLogs()"),
            DebugQuery::GetLogs { area: Some(area) } => write!(f, "getLogs('{}')", area),
        }
    }
}

fn reject(query: &str, reason: &str) -> Error {
    Error::Validation(format!("Unsupported query '{}': {}", query, reason))
}

/// Parse the argument list between the parentheses: empty, or one quoted string.
fn parse_args(raw: &str, query: &str) -> Result<Option<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let mut chars = raw.chars();
    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(reject(query, "arguments must be quoted strings")),
    };
    let rest = chars.as_str();
    let Some(end) = rest.find(quote) else {
        return Err(reject(query, "unterminated string"));
    };
    if !rest[end + quote.len_utf8()..].trim().is_empty() {
        return Err(reject(query, "expected a single argument"));
    }
    Ok(Some(rest[..end].to_string()))
}

impl FromStr for DebugQuery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let query = s.trim().trim_end_matches(';').trim();
        let query = query.strip_prefix("debugService.").unwrap_or(query);

        let Some(open) = query.find('(') else {
            return Err(reject(s, "expected a call like getFeatureTests()"));
        };
        let Some(inner) = query[open + 1..].strip_suffix(')') else {
            return Err(reject(s, "expected a closing parenthesis"));
        };
        let name = query[..open].trim();
        if !DebugQuery::ALLOWED.contains(&name) {
            return Err(reject(s, "not in the allow-list"));
        }
        let arg = parse_args(inner, s)?;

        let required = |arg: Option<String>, what: &str| -> Result<String> {
            match arg {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(reject(s, &format!("{} requires a {}", name, what))),
            }
        };
        let none = |arg: &Option<String>| -> Result<()> {
            match arg {
                None => Ok(()),
                Some(_) => Err(reject(s, &format!("{} takes no arguments", name))),
            }
        };

        let parsed = match name {
            "getEnhancedFeatures" => {
                none(&arg)?;
                DebugQuery::GetEnhancedFeatures
            }
            "getEnhancedFeature" => DebugQuery::GetEnhancedFeature {
                name: required(arg, "feature name")?,
            },
            "getFeatureTests" => {
                none(&arg)?;
                DebugQuery::GetFeatureTests
            }
            "getTestsForFeature" => DebugQuery::GetTestsForFeature {
                name: required(arg, "feature name")?,
            },
            "getTestResults" => {
                none(&arg)?;
                DebugQuery::GetTestResults
            }
            "runTest" => DebugQuery::RunTest {
                id: required(arg, "test id")?,
            },
            "runAllTests" => {
                none(&arg)?;
                DebugQuery::RunAllTests
            }
            "generateTestReport" => {
                none(&arg)?;
                DebugQuery::GenerateTestReport
            }
            "getLogs" => DebugQuery::GetLogs { area: arg },
            _ => return Err(reject(s, "not in the allow-list")),
        };
        Ok(parsed)
    }
}

/// Run a parsed query against the service and return its JSON result.
pub async fn execute_query(service: &mut DebugService, query: &DebugQuery) -> Result<serde_json::Value> {
    tracing::debug!(%query, "Executing debug query");
    let value = match query {
        DebugQuery::GetEnhancedFeatures => serde_json::to_value(service.get_enhanced_features())?,
        DebugQuery::GetEnhancedFeature { name } => {
            serde_json::to_value(service.get_enhanced_feature(name)?)?
        }
        DebugQuery::GetFeatureTests => serde_json::to_value(service.get_feature_tests())?,
        DebugQuery::GetTestsForFeature { name } => {
            serde_json::to_value(service.get_tests_for_feature(name))?
        }
        DebugQuery::GetTestResults => serde_json::to_value(service.get_test_results())?,
        DebugQuery::RunTest { id } => serde_json::to_value(service.run_test(id).await)?,
        DebugQuery::RunAllTests => serde_json::to_value(service.run_all().await)?,
        DebugQuery::GenerateTestReport => {
            serde_json::json!({"report": service.generate_test_report()})
        }
        DebugQuery::GetLogs { area } => {
            let mut filter = LogFilter::new().limit(QUERY_LOG_LIMIT);
            if let Some(area) = area {
                filter = filter.area(area);
            }
            serde_json::to_value(service.get_logs(&filter))?
        }
    };
    Ok(value)
}

/// Parse and execute a raw query string.
pub async fn execute_query_str(service: &mut DebugService, query: &str) -> Result<serde_json::Value> {
    let parsed: DebugQuery = query.parse()?;
    execute_query(service, &parsed).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feature, LogEntry, LogLevel};
    use crate::test_utils::fixed_test;

    #[test]
    fn test_parse_allowed_queries() {
        assert_eq!(
            "getEnhancedFeatures()".parse::<DebugQuery>().unwrap(),
            DebugQuery::GetEnhancedFeatures
        );
        assert_eq!(
            "getEnhancedFeature('dashboard-stats')".parse::<DebugQuery>().unwrap(),
            DebugQuery::GetEnhancedFeature {
                name: "dashboard-stats".to_string()
            }
        );
        assert_eq!(
            r#"  runTest("t1");  "#.parse::<DebugQuery>().unwrap(),
            DebugQuery::RunTest {
                id: "t1".to_string()
            }
        );
        assert_eq!(
            "debugService.getLogs('api')".parse::<DebugQuery>().unwrap(),
            DebugQuery::GetLogs {
                area: Some("api".to_string())
            }
        );
        assert_eq!(
            "getLogs()".parse::<DebugQuery>().unwrap(),
            DebugQuery::GetLogs { area: None }
        );
    }

    #[test]
    fn test_parse_rejects_everything_else() {
        for query in [
            "",
            "process.exit(1)",
            "getFeatureTests",
            "getFeatureTests('x')",
            "getEnhancedFeature()",
            "runTest(t1)",
            "runTest('t1', 't2')",
            "runTest('t1'",
            "getLogs('api') + 1",
            "getLogs('unterminated)",
            "constructor.constructor('x')()",
        ] {
            let err = query.parse::<DebugQuery>().unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "accepted: {}", query);
        }
    }

    #[test]
    fn test_display_reparses() {
        let query = DebugQuery::GetTestsForFeature {
            name: "goal-management".to_string(),
        };
        assert_eq!(query.to_string().parse::<DebugQuery>().unwrap(), query);
        assert!(DebugQuery::RunAllTests.is_mutating());
        assert!(!DebugQuery::GetTestResults.is_mutating());
    }

    #[tokio::test]
    async fn test_execute_queries() {
        let mut service = DebugService::new();
        service
            .register_feature(Feature::new("goal-management").with_area("goals"))
            .unwrap();
        service.register_feature_test(fixed_test("goal-create", "goals", true)).unwrap();
        service.log(LogEntry::new(LogLevel::Info, "api", "hello"));

        let run = execute_query_str(&mut service, "runTest('goal-create')").await.unwrap();
        assert_eq!(run["status"], "passed");

        let feature = execute_query_str(&mut service, "getEnhancedFeature('goal-management')")
            .await
            .unwrap();
        assert_eq!(feature["testStatus"], "passed");

        let tests = execute_query_str(&mut service, "getTestsForFeature('goal-management')")
            .await
            .unwrap();
        assert_eq!(tests.as_array().unwrap().len(), 1);

        let logs = execute_query_str(&mut service, "getLogs('api')").await.unwrap();
        assert_eq!(logs.as_array().unwrap().len(), 1);

        let report = execute_query_str(&mut service, "generateTestReport()").await.unwrap();
        assert!(report["report"].as_str().unwrap().contains("goal-create"));
    }

    #[tokio::test]
    async fn test_execute_unknown_feature_is_not_found() {
        let mut service = DebugService::new();
        let err = execute_query_str(&mut service, "getEnhancedFeature('ghost')")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
