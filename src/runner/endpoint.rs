//! HTTP endpoint probes.
//!
//! An [`EndpointCheck`] describes one request against the goal tracker's
//! backend and the status code it should return. Turning it into a
//! [`FeatureTest`] lets the runner schedule it like any other test. Every
//! probe also reports an [`ApiTestResult`] through a channel so the owner
//! can keep it in the store.

use super::{FeatureTest, TestOutcome};
use crate::Error;
use crate::models::ApiTestResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Area assigned to probes that don't name one.
pub const DEFAULT_ENDPOINT_AREA: &str = "api";

/// Maximum characters of response body kept in a result.
pub const RESPONSE_PREVIEW_CHARS: usize = 200;

const USER_AGENT: &str = concat!("featurelens/", env!("CARGO_PKG_VERSION"));

/// A configured HTTP check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCheck {
    /// Test ID of the generated feature test
    pub name: String,
    /// Path appended to the base URL (e.g., "/api/goals")
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_status")]
    pub expect_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

impl EndpointCheck {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            method: default_method(),
            expect_status: default_status(),
            feature: None,
            area: None,
            depends_on: Vec::new(),
        }
    }

    /// Join the base URL and this check's path with exactly one slash.
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Build a feature test that performs this probe.
    pub fn into_test(
        self,
        base_url: &str,
        timeout: Duration,
        results: UnboundedSender<ApiTestResult>,
    ) -> FeatureTest {
        let url = self.url(base_url);
        let method = self.method.to_uppercase();
        let name = format!("{} {}", method, self.path);
        let area = self
            .area
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT_AREA.to_string());
        let endpoint = self.name.clone();
        let expected = self.expect_status;

        let mut test = FeatureTest::new(&self.name, name, area, move || {
            let url = url.clone();
            let method = method.clone();
            let endpoint = endpoint.clone();
            let results = results.clone();
            async move {
                let result = tokio::task::spawn_blocking(move || {
                    probe(&endpoint, &method, &url, expected, timeout)
                })
                .await?;

                let outcome = outcome_of(&result);
                if results.send(result).is_err() {
                    tracing::debug!("Endpoint result receiver dropped");
                }
                outcome
            }
        })
        .with_description(format!(
            "Expect {} from {} {}",
            self.expect_status, self.method, self.path
        ))
        .with_dependencies(self.depends_on);

        if let Some(feature) = self.feature {
            test = test.with_feature(feature);
        }
        test
    }
}

fn outcome_of(result: &ApiTestResult) -> TestOutcome {
    if result.success {
        return Ok(true);
    }
    let message = result.error.clone().unwrap_or_else(|| {
        format!(
            "expected status {}, got {}",
            result.expected_status,
            result
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "no response".to_string())
        )
    });
    Err(Error::Http(message).into())
}

fn preview(body: String) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    Some(body.chars().take(RESPONSE_PREVIEW_CHARS).collect())
}

/// Issue one blocking request and describe the outcome.
pub fn probe(
    endpoint: &str,
    method: &str,
    url: &str,
    expected_status: u16,
    timeout: Duration,
) -> ApiTestResult {
    let start = Instant::now();
    let response = ureq::request(method, url)
        .timeout(timeout)
        .set("User-Agent", USER_AGENT)
        .set("Accept", "application/json")
        .call();

    let (status, body, transport_error) = match response {
        Ok(resp) => {
            let status = resp.status();
            (Some(status), resp.into_string().unwrap_or_default(), None)
        }
        // Non-2xx responses still carry a status worth comparing
        Err(ureq::Error::Status(code, resp)) => {
            (Some(code), resp.into_string().unwrap_or_default(), None)
        }
        Err(e) => (None, String::new(), Some(e.to_string())),
    };
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    let success = status == Some(expected_status);

    let error = match (transport_error, status) {
        (Some(e), _) => Some(e),
        (None, Some(code)) if !success => Some(format!(
            "expected status {}, got {}",
            expected_status, code
        )),
        _ => None,
    };

    ApiTestResult {
        endpoint: endpoint.to_string(),
        method: method.to_string(),
        url: url.to_string(),
        status,
        expected_status,
        success,
        duration_ms,
        error,
        timestamp: Utc::now(),
        response_preview: preview(body),
    }
}
