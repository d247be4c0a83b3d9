//! Configuration for Featurelens.
//!
//! ## config.kdl
//!
//! Located at (first match wins):
//! - `--config <path>` / `FL_CONFIG`
//! - `<data-dir>/config.kdl`
//!
//! Contains:
//! - `log-capacity` - Generic log entries kept in the store
//! - `api-result-capacity` - Endpoint probe results kept in the store
//! - `context-capacity` - Completed execution contexts kept in memory
//! - `test-timeout-ms` - Per-test timeout
//! - `base-url` - Base URL for endpoint probes
//! - `feature` nodes - Feature definitions
//! - `endpoint` nodes - HTTP probes run as feature tests
//!
//! ## Precedence
//!
//! For settings: CLI flag > environment > config.kdl > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    BASE_URL_ENV, ConfigOverrides, DEFAULT_BASE_URL, Resolved, ResolvedSettings, TEST_TIMEOUT_ENV,
    ValueSource, resolve_settings, resolve_settings_with_env,
};
pub use schema::FeaturelensConfig;

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.kdl";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FL_CONFIG";

/// Where the config file lives and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    /// Explicitly requested files must exist
    pub required: bool,
}

/// Pick the config file: an explicit path, else `<data-dir>/config.kdl`.
pub fn locate_config(explicit: Option<&Path>, data_dir: &Path) -> ConfigLocation {
    match explicit {
        Some(path) => ConfigLocation {
            path: path.to_path_buf(),
            required: true,
        },
        None => ConfigLocation {
            path: data_dir.join(CONFIG_FILE),
            required: false,
        },
    }
}

/// Load config from `location`. A missing optional file yields defaults.
pub fn load_config(location: &ConfigLocation) -> Result<Option<FeaturelensConfig>> {
    if !location.path.exists() {
        if location.required {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                location.path.display()
            )));
        }
        return Ok(None);
    }
    let content = std::fs::read_to_string(&location.path)?;
    let config = FeaturelensConfig::parse(&content)?;
    config.validate().map_err(Error::Config)?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_locate_config() {
        let data = PathBuf::from("/data");
        let default = locate_config(None, &data);
        assert_eq!(default.path, PathBuf::from("/data/config.kdl"));
        assert!(!default.required);

        let explicit = PathBuf::from("/etc/fl.kdl");
        let located = locate_config(Some(&explicit), &data);
        assert_eq!(located.path, explicit);
        assert!(located.required);
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        let optional = locate_config(None, temp.path());
        assert!(load_config(&optional).unwrap().is_none());

        let missing = temp.path().join("nope.kdl");
        let required = locate_config(Some(&missing), temp.path());
        assert!(matches!(load_config(&required), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_and_validate() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);

        std::fs::write(&path, "log-capacity 10\n").unwrap();
        let config = load_config(&locate_config(None, temp.path())).unwrap().unwrap();
        assert_eq!(config.log_capacity, Some(10));

        std::fs::write(&path, "log-capacity 0\n").unwrap();
        assert!(load_config(&locate_config(None, temp.path())).is_err());
    }
}
