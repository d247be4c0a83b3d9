//! Feature-test mapping.
//!
//! Every registered test is assigned to exactly one feature. The assignment
//! is recomputed from scratch on each refresh by trying, in order:
//!
//! 1. the test's explicit feature name
//! 2. the curated catalog
//! 3. the first feature whose area equals the test's area
//! 4. normalized name containment between feature name and test name/id
//! 5. a relaxed area comparison, else the synthetic "Other Features" bucket
//!
//! Listeners subscribed to the engine are notified of mapping and test status
//! changes. A failing listener never prevents the others from running.

pub mod catalog;

use crate::models::{Feature, FeatureTestInfo, MatchTier, TestStatus};
use catalog::CatalogEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

/// Feature that collects tests no tier could place.
pub const OTHER_FEATURES: &str = "Other Features";

/// Handle returned by [`MappingEngine::subscribe`].
pub type SubscriptionId = u64;

/// Error a listener may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Change notification callback.
pub type Listener =
    Box<dyn Fn(&MappingEvent) -> std::result::Result<(), ListenerError> + Send + Sync>;

/// What changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingEvent {
    /// Indices were rebuilt
    MappingRefreshed { features: usize, tests: usize },
    /// A test produced a new result
    TestStatusChanged {
        test_id: String,
        feature: Option<String>,
        status: TestStatus,
    },
}

/// A listener that errored or panicked during notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub subscription: SubscriptionId,
    pub error: String,
}

/// Forward and reverse indices produced by one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingIndex {
    /// Feature name to test IDs, in test registration order
    pub forward: BTreeMap<String, Vec<String>>,
    /// Test ID to feature name
    pub reverse: BTreeMap<String, String>,
    /// Test ID to the tier that placed it
    pub tiers: BTreeMap<String, MatchTier>,
}

impl MappingIndex {
    fn insert(&mut self, test_id: &str, feature: &str, tier: MatchTier) {
        self.forward
            .entry(feature.to_string())
            .or_default()
            .push(test_id.to_string());
        self.reverse.insert(test_id.to_string(), feature.to_string());
        self.tiers.insert(test_id.to_string(), tier);
    }
}

/// Lowercase and strip everything but letters and digits.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Place one test. Returns the feature name and the tier that fired.
fn place(
    test: &FeatureTestInfo,
    features: &[Feature],
    catalog: &[CatalogEntry],
) -> (String, MatchTier) {
    if let Some(feature) = test.feature_name.as_deref().filter(|f| !f.trim().is_empty()) {
        return (feature.to_string(), MatchTier::Explicit);
    }

    if let Some(feature) = catalog::feature_for_test(catalog, &test.id) {
        return (feature.to_string(), MatchTier::Catalog);
    }

    if let Some(feature) = features
        .iter()
        .find(|f| f.area.as_deref() == Some(test.area.as_str()))
    {
        return (feature.name.clone(), MatchTier::Area);
    }

    let test_name = normalize(&test.name);
    let test_id = normalize(&test.id);
    if let Some(feature) = features.iter().find(|f| {
        let name = normalize(&f.name);
        contains_either(&test_name, &name) || contains_either(&test_id, &name)
    }) {
        return (feature.name.clone(), MatchTier::Fuzzy);
    }

    let test_area = normalize(&test.area);
    if let Some(feature) = features.iter().find(|f| {
        f.area
            .as_deref()
            .is_some_and(|a| !test_area.is_empty() && normalize(a) == test_area)
    }) {
        return (feature.name.clone(), MatchTier::Fallback);
    }

    (OTHER_FEATURES.to_string(), MatchTier::Unmatched)
}

/// Bidirectional feature/test index plus change listeners.
pub struct MappingEngine {
    index: MappingIndex,
    catalog: &'static [CatalogEntry],
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingEngine {
    /// Engine using the goal tracker catalog.
    pub fn new() -> Self {
        Self::with_catalog(catalog::GOAL_TRACKER_CATALOG)
    }

    pub fn with_catalog(catalog: &'static [CatalogEntry]) -> Self {
        Self {
            index: MappingIndex::default(),
            catalog,
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Discard both indices and recompute them.
    ///
    /// `features` and `tests` are in registration order; ties in the area and
    /// fuzzy tiers go to the earliest registered feature.
    pub fn refresh(&mut self, features: &[Feature], tests: &[FeatureTestInfo]) {
        let mut index = MappingIndex::default();
        for test in tests {
            let (feature, tier) = place(test, features, self.catalog);
            index.insert(&test.id, &feature, tier);
        }
        tracing::debug!(
            features = index.forward.len(),
            tests = index.reverse.len(),
            "Feature mapping refreshed"
        );
        self.index = index;
    }

    pub fn index(&self) -> &MappingIndex {
        &self.index
    }

    pub fn feature_for_test(&self, test_id: &str) -> Option<&str> {
        self.index.reverse.get(test_id).map(String::as_str)
    }

    /// Test IDs mapped to `feature`, in registration order.
    pub fn tests_for_feature(&self, feature: &str) -> &[String] {
        self.index
            .forward
            .get(feature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn match_tier(&self, test_id: &str) -> Option<MatchTier> {
        self.index.tiers.get(test_id).copied()
    }

    /// Names of features that received at least one test.
    pub fn mapped_features(&self) -> Vec<&str> {
        self.index.forward.keys().map(String::as_str).collect()
    }

    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Invoke every listener with `event`, collecting failures.
    pub fn notify(&self, event: &MappingEvent) -> Vec<ListenerFailure> {
        let mut failures = Vec::new();
        for (id, listener) in &self.listeners {
            let error = match std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    format!("listener panicked: {}", message)
                }
            };
            tracing::warn!(subscription = *id, "Mapping listener failed: {}", error);
            failures.push(ListenerFailure {
                subscription: *id,
                error,
            });
        }
        failures
    }
}
