//! Curated feature table for the goal tracker.
//!
//! Each entry names a product feature, the functional area it lives in, and
//! the test IDs known to verify it. The table takes precedence over area and
//! name heuristics but not over a test's own explicit feature.

use crate::models::Feature;

/// One curated feature and the tests that verify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub feature: &'static str,
    pub area: &'static str,
    pub description: &'static str,
    pub tests: &'static [&'static str],
}

/// The goal tracker's known features.
pub const GOAL_TRACKER_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        feature: "dashboard-stats",
        area: "dashboard",
        description: "Summary cards for active, completed, and overdue goals",
        tests: &["dashboard-stats-load", "dashboard-summary-cards", "dashboard-recent-activity"],
    },
    CatalogEntry {
        feature: "goal-management",
        area: "goals",
        description: "Create, edit, archive, and delete goals",
        tests: &["goal-create", "goal-list", "goal-update", "goal-delete", "goal-archive"],
    },
    CatalogEntry {
        feature: "progress-tracking",
        area: "progress",
        description: "Log progress entries and compute completion percentage",
        tests: &["progress-log", "progress-history", "progress-percentage"],
    },
    CatalogEntry {
        feature: "categories",
        area: "categories",
        description: "Group goals under user-defined categories",
        tests: &["category-create", "category-list", "category-assign"],
    },
    CatalogEntry {
        feature: "achievements",
        area: "achievements",
        description: "Award milestones when goals are completed",
        tests: &["achievement-unlock", "achievement-list"],
    },
    CatalogEntry {
        feature: "analytics",
        area: "analytics",
        description: "Completion trends and streaks over time",
        tests: &["analytics-trends", "analytics-completion-rate", "analytics-streaks"],
    },
    CatalogEntry {
        feature: "api-health",
        area: "api",
        description: "Backend reachability and health endpoint",
        tests: &["api-health-check", "api-connectivity"],
    },
];

/// Look up the curated feature for a test ID.
pub fn feature_for_test(catalog: &[CatalogEntry], test_id: &str) -> Option<&'static str> {
    catalog
        .iter()
        .find(|entry| entry.tests.contains(&test_id))
        .map(|entry| entry.feature)
}

/// Catalog entries as registrable features, in table order.
pub fn features(catalog: &[CatalogEntry]) -> Vec<Feature> {
    catalog
        .iter()
        .map(|entry| {
            Feature::new(entry.feature)
                .with_area(entry.area)
                .with_description(entry.description)
        })
        .collect()
}
