//! KDL schema for config.kdl.
//!
//! ```kdl
//! log-capacity 1000
//! api-result-capacity 100
//! context-capacity 100
//! test-timeout-ms 30000
//! base-url "http://localhost:3000"
//!
//! feature "dashboard-stats" area="dashboard" description="Summary cards"
//! endpoint "goal-list" path="/api/goals" method="GET" expect-status=200 feature="goal-management"
//! endpoint "goal-create" path="/api/goals" method="POST" expect-status=201 depends-on="goal-list"
//! ```

use crate::models::Feature;
use crate::runner::endpoint::EndpointCheck;
use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Contents of config.kdl. Unset scalars fall back to defaults during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturelensConfig {
    pub log_capacity: Option<usize>,
    pub api_result_capacity: Option<usize>,
    /// Completed execution contexts kept by the tracer
    pub context_capacity: Option<usize>,
    pub test_timeout_ms: Option<u64>,
    pub base_url: Option<String>,
    /// Feature definitions in file order
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Endpoint probes in file order
    #[serde(default)]
    pub endpoints: Vec<EndpointCheck>,
}

fn first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .map(|e| e.value())
}

fn string_prop(node: &KdlNode, key: &str) -> Result<Option<String>> {
    match get_prop(node, key) {
        None => Ok(None),
        Some(value) => value
            .as_string()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| Error::Config(format!("'{}' must be a string", key))),
    }
}

fn node_integer(name: &str, value: Option<&KdlValue>) -> Result<Option<u64>> {
    match value {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .and_then(|i| u64::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| Error::Config(format!("'{}' must be a non-negative integer", name))),
    }
}

fn scalar<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name).and_then(first_arg)
}

fn to_usize(name: &str, value: Option<u64>) -> Result<Option<usize>> {
    value
        .map(|v| usize::try_from(v).map_err(|_| Error::Config(format!("'{}' is too large", name))))
        .transpose()
}

fn parse_feature(node: &KdlNode) -> Result<Feature> {
    let name = first_arg(node)
        .and_then(|v| v.as_string())
        .ok_or_else(|| Error::Config("feature node must have a name argument".to_string()))?;
    let mut feature = Feature::new(name);
    feature.area = string_prop(node, "area")?;
    feature.description = string_prop(node, "description")?;
    Ok(feature)
}

fn parse_endpoint(node: &KdlNode) -> Result<EndpointCheck> {
    let name = first_arg(node)
        .and_then(|v| v.as_string())
        .ok_or_else(|| Error::Config("endpoint node must have a name argument".to_string()))?;
    let path = string_prop(node, "path")?
        .ok_or_else(|| Error::Config(format!("endpoint '{}' is missing path", name)))?;

    let mut check = EndpointCheck::new(name, path);
    if let Some(method) = string_prop(node, "method")? {
        check.method = method.to_uppercase();
    }
    if let Some(status) = node_integer("expect-status", get_prop(node, "expect-status"))? {
        check.expect_status = u16::try_from(status)
            .map_err(|_| Error::Config(format!("endpoint '{}' has an invalid status", name)))?;
    }
    check.feature = string_prop(node, "feature")?;
    check.area = string_prop(node, "area")?;
    if let Some(deps) = string_prop(node, "depends-on")? {
        check.depends_on = deps
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
    }
    Ok(check)
}

impl FeaturelensConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from KDL text.
    pub fn parse(content: &str) -> Result<Self> {
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Config(format!("Invalid config.kdl: {}", e)))?;
        Self::from_kdl(&doc)
    }

    /// Parse config from a KDL document.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let mut config = Self::new();

        config.log_capacity = to_usize(
            "log-capacity",
            node_integer("log-capacity", scalar(doc, "log-capacity"))?,
        )?;
        config.api_result_capacity = to_usize(
            "api-result-capacity",
            node_integer("api-result-capacity", scalar(doc, "api-result-capacity"))?,
        )?;
        config.context_capacity = to_usize(
            "context-capacity",
            node_integer("context-capacity", scalar(doc, "context-capacity"))?,
        )?;
        config.test_timeout_ms = node_integer("test-timeout-ms", scalar(doc, "test-timeout-ms"))?;

        if let Some(value) = scalar(doc, "base-url") {
            let url = value
                .as_string()
                .ok_or_else(|| Error::Config("'base-url' must be a string".to_string()))?;
            config.base_url = Some(url.to_string());
        }

        for node in doc.nodes() {
            match node.name().value() {
                "feature" => config.features.push(parse_feature(node)?),
                "endpoint" => config.endpoints.push(parse_endpoint(node)?),
                _ => {}
            }
        }

        Ok(config)
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        let push_int = |doc: &mut KdlDocument, name: &str, value: Option<u64>| {
            if let Some(value) = value {
                let mut node = KdlNode::new(name);
                node.push(KdlEntry::new(KdlValue::Integer(value as i128)));
                doc.nodes_mut().push(node);
            }
        };
        push_int(&mut doc, "log-capacity", self.log_capacity.map(|v| v as u64));
        push_int(
            &mut doc,
            "api-result-capacity",
            self.api_result_capacity.map(|v| v as u64),
        );
        push_int(
            &mut doc,
            "context-capacity",
            self.context_capacity.map(|v| v as u64),
        );
        push_int(&mut doc, "test-timeout-ms", self.test_timeout_ms);

        if let Some(ref url) = self.base_url {
            let mut node = KdlNode::new("base-url");
            node.push(KdlEntry::new(KdlValue::String(url.clone())));
            doc.nodes_mut().push(node);
        }

        for feature in &self.features {
            let mut node = KdlNode::new("feature");
            node.push(KdlEntry::new(KdlValue::String(feature.name.clone())));
            if let Some(ref area) = feature.area {
                node.push(KdlEntry::new_prop("area", KdlValue::String(area.clone())));
            }
            if let Some(ref description) = feature.description {
                node.push(KdlEntry::new_prop(
                    "description",
                    KdlValue::String(description.clone()),
                ));
            }
            doc.nodes_mut().push(node);
        }

        for check in &self.endpoints {
            let mut node = KdlNode::new("endpoint");
            node.push(KdlEntry::new(KdlValue::String(check.name.clone())));
            node.push(KdlEntry::new_prop("path", KdlValue::String(check.path.clone())));
            node.push(KdlEntry::new_prop("method", KdlValue::String(check.method.clone())));
            node.push(KdlEntry::new_prop(
                "expect-status",
                KdlValue::Integer(check.expect_status as i128),
            ));
            if let Some(ref feature) = check.feature {
                node.push(KdlEntry::new_prop("feature", KdlValue::String(feature.clone())));
            }
            if let Some(ref area) = check.area {
                node.push(KdlEntry::new_prop("area", KdlValue::String(area.clone())));
            }
            if !check.depends_on.is_empty() {
                node.push(KdlEntry::new_prop(
                    "depends-on",
                    KdlValue::String(check.depends_on.join(",")),
                ));
            }
            doc.nodes_mut().push(node);
        }

        doc
    }

    /// Render as formatted KDL text.
    pub fn render(&self) -> String {
        let mut doc = self.to_kdl();
        doc.autoformat();
        doc.to_string()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.log_capacity == Some(0) {
            return Err("log-capacity must be greater than 0".to_string());
        }
        if self.api_result_capacity == Some(0) {
            return Err("api-result-capacity must be greater than 0".to_string());
        }
        if self.context_capacity == Some(0) {
            return Err("context-capacity must be greater than 0".to_string());
        }
        if self.test_timeout_ms == Some(0) {
            return Err("test-timeout-ms must be greater than 0".to_string());
        }
        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("base-url must start with http:// or https://, got {}", url));
            }
        }
        for check in &self.endpoints {
            if !(100..=599).contains(&check.expect_status) {
                return Err(format!(
                    "endpoint '{}' expect-status must be 100-599, got {}",
                    check.name, check.expect_status
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_kdl_empty() {
        let config = FeaturelensConfig::from_kdl(&KdlDocument::new()).unwrap();
        assert_eq!(config, FeaturelensConfig::default());
    }

    #[test]
    fn test_config_from_kdl_full() {
        let kdl = r#"
            log-capacity 500
            api-result-capacity 20
            test-timeout-ms 5000
            base-url "http://localhost:4000"

            feature "dashboard-stats" area="dashboard" description="Summary cards"
            feature "analytics"
            endpoint "goal-list" path="/api/goals"
            endpoint "goal-create" path="/api/goals" method="post" expect-status=201 feature="goal-management" depends-on="goal-list, api-health-check"
        "#;
        let config = FeaturelensConfig::parse(kdl).unwrap();

        assert_eq!(config.log_capacity, Some(500));
        assert_eq!(config.api_result_capacity, Some(20));
        assert_eq!(config.test_timeout_ms, Some(5000));
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:4000"));

        assert_eq!(config.features.len(), 2);
        assert_eq!(config.features[0].area.as_deref(), Some("dashboard"));
        assert_eq!(config.features[1].area, None);

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].method, "GET");
        assert_eq!(config.endpoints[0].expect_status, 200);
        let create = &config.endpoints[1];
        assert_eq!(create.method, "POST");
        assert_eq!(create.expect_status, 201);
        assert_eq!(create.feature.as_deref(), Some("goal-management"));
        assert_eq!(create.depends_on, vec!["goal-list", "api-health-check"]);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            FeaturelensConfig::parse("log-capacity -1"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FeaturelensConfig::parse("base-url 5"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FeaturelensConfig::parse(r#"endpoint "x""#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FeaturelensConfig::parse("feature area=\"x\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FeaturelensConfig::parse("not valid {{{"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_config_to_kdl_roundtrip() {
        let mut check = EndpointCheck::new("goal-create", "/api/goals");
        check.method = "POST".to_string();
        check.expect_status = 201;
        check.depends_on = vec!["goal-list".to_string()];

        let config = FeaturelensConfig {
            log_capacity: Some(10),
            api_result_capacity: None,
            context_capacity: Some(5),
            test_timeout_ms: Some(250),
            base_url: Some("http://127.0.0.1:3000".to_string()),
            features: vec![Feature::new("analytics").with_area("analytics")],
            endpoints: vec![check],
        };

        let parsed = FeaturelensConfig::from_kdl(&config.to_kdl()).unwrap();
        assert_eq!(parsed, config);

        let reparsed = FeaturelensConfig::parse(&config.render()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_config_validate() {
        assert!(FeaturelensConfig::default().validate().is_ok());

        let zero = FeaturelensConfig {
            log_capacity: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().unwrap_err().contains("log-capacity"));

        let contexts = FeaturelensConfig {
            context_capacity: Some(0),
            ..Default::default()
        };
        assert!(contexts.validate().unwrap_err().contains("context-capacity"));

        let timeout = FeaturelensConfig {
            test_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(timeout.validate().unwrap_err().contains("test-timeout-ms"));

        let url = FeaturelensConfig {
            base_url: Some("localhost".to_string()),
            ..Default::default()
        };
        assert!(url.validate().is_err());

        let mut check = EndpointCheck::new("x", "/x");
        check.expect_status = 42;
        let status = FeaturelensConfig {
            endpoints: vec![check],
            ..Default::default()
        };
        assert!(status.validate().unwrap_err().contains("expect-status"));
    }
}
