//! Precedence resolution for runtime settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`FL_BASE_URL`, `FL_TEST_TIMEOUT_MS`)
//! 3. config.kdl
//! 4. Built-in defaults
//!
//! Capacities have no CLI flag or environment variable; they come from
//! config.kdl or the defaults.

use super::schema::FeaturelensConfig;
use crate::service::ServiceOptions;
use crate::storage::{DEFAULT_API_RESULT_CAPACITY, DEFAULT_LOG_CAPACITY};
use crate::tracer::DEFAULT_CONTEXT_CAPACITY;
use crate::{Error, Result, runner};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding the probe base URL.
pub const BASE_URL_ENV: &str = "FL_BASE_URL";

/// Environment variable overriding the per-test timeout.
pub const TEST_TIMEOUT_ENV: &str = "FL_TEST_TIMEOUT_MS";

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from a config file
    ConfigFile(String),
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile(path) => write!(f, "config:{}", path),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for settings resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub test_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_test_timeout_ms(mut self, ms: u64) -> Self {
        self.test_timeout_ms = Some(ms);
        self
    }
}

/// Fully resolved settings with source tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSettings {
    pub log_capacity: Resolved<usize>,
    pub api_result_capacity: Resolved<usize>,
    pub context_capacity: Resolved<usize>,
    pub test_timeout_ms: Resolved<u64>,
    pub base_url: Resolved<String>,
}

impl Default for ResolvedSettings {
    fn default() -> Self {
        Self {
            log_capacity: Resolved::new(DEFAULT_LOG_CAPACITY, ValueSource::Default),
            api_result_capacity: Resolved::new(DEFAULT_API_RESULT_CAPACITY, ValueSource::Default),
            context_capacity: Resolved::new(DEFAULT_CONTEXT_CAPACITY, ValueSource::Default),
            test_timeout_ms: Resolved::new(
                runner::DEFAULT_TEST_TIMEOUT.as_millis() as u64,
                ValueSource::Default,
            ),
            base_url: Resolved::new(DEFAULT_BASE_URL.to_string(), ValueSource::Default),
        }
    }
}

impl ResolvedSettings {
    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms.value)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url.value
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            log_capacity: self.log_capacity.value,
            api_result_capacity: self.api_result_capacity.value,
            context_capacity: self.context_capacity.value,
            test_timeout: self.test_timeout(),
        }
    }
}

/// Resolve settings reading overrides from the process environment.
pub fn resolve_settings(
    config: &FeaturelensConfig,
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ResolvedSettings> {
    resolve_settings_with_env(config, config_path, overrides, |name| {
        std::env::var(name).ok()
    })
}

/// Resolve settings with an explicit environment lookup.
pub fn resolve_settings_with_env<F>(
    config: &FeaturelensConfig,
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    env: F,
) -> Result<ResolvedSettings>
where
    F: Fn(&str) -> Option<String>,
{
    config.validate().map_err(Error::Config)?;

    let mut result = ResolvedSettings::default();
    let file_source = || {
        ValueSource::ConfigFile(
            config_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "config.kdl".to_string()),
        )
    };
    let env_value = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    if let Some(capacity) = config.log_capacity {
        result.log_capacity = Resolved::new(capacity, file_source());
    }
    if let Some(capacity) = config.api_result_capacity {
        result.api_result_capacity = Resolved::new(capacity, file_source());
    }
    if let Some(capacity) = config.context_capacity {
        result.context_capacity = Resolved::new(capacity, file_source());
    }

    // Resolve test timeout
    if let Some(ms) = overrides.test_timeout_ms {
        result.test_timeout_ms = Resolved::new(ms, ValueSource::CliFlag);
    } else if let Some(raw) = env_value(TEST_TIMEOUT_ENV) {
        let ms: u64 = raw.trim().parse().map_err(|_| {
            Error::Config(format!("{} must be an integer, got '{}'", TEST_TIMEOUT_ENV, raw))
        })?;
        result.test_timeout_ms =
            Resolved::new(ms, ValueSource::EnvVar(TEST_TIMEOUT_ENV.to_string()));
    } else if let Some(ms) = config.test_timeout_ms {
        result.test_timeout_ms = Resolved::new(ms, file_source());
    }
    if result.test_timeout_ms.value == 0 {
        return Err(Error::Config("test timeout must be greater than 0".to_string()));
    }

    // Resolve base URL
    if let Some(ref url) = overrides.base_url {
        result.base_url = Resolved::new(url.clone(), ValueSource::CliFlag);
    } else if let Some(url) = env_value(BASE_URL_ENV) {
        result.base_url = Resolved::new(url, ValueSource::EnvVar(BASE_URL_ENV.to_string()));
    } else if let Some(ref url) = config.base_url {
        result.base_url = Resolved::new(url.clone(), file_source());
    }

    Ok(result)
}
