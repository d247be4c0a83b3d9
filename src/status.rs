//! Feature status aggregation.
//!
//! Folds a feature's manual verification flags and the latest results of its
//! mapped tests into one [`EnhancedFeatureStatus`].

use crate::models::{
    EnhancedFeatureStatus, Feature, FeatureTestStatus, FeatureVerification, ImplementationSource,
    MappedTestStatus, TestCounts, TestStatus,
};

/// Count mapped tests by status. Running tests count as not run.
pub fn count_tests(tests: &[MappedTestStatus]) -> TestCounts {
    let mut counts = TestCounts {
        total: tests.len(),
        ..TestCounts::default()
    };
    for test in tests {
        match test.status {
            TestStatus::Passed => counts.passed += 1,
            TestStatus::Failed => counts.failed += 1,
            TestStatus::Skipped => counts.skipped += 1,
            TestStatus::NotStarted | TestStatus::Running => counts.not_run += 1,
        }
    }
    counts
}

/// Derive the aggregate test status from per-status counts.
///
/// Precedence: no tests, all passed, any failed, partial pass, all run
/// tests skipped, otherwise not tested.
pub fn derive_test_status(counts: &TestCounts) -> FeatureTestStatus {
    if counts.total == 0 {
        return FeatureTestStatus::NotTested;
    }
    if counts.passed == counts.total {
        return FeatureTestStatus::Passed;
    }
    if counts.failed > 0 {
        return FeatureTestStatus::Failed;
    }
    if counts.passed > 0 && counts.skipped + counts.not_run > 0 {
        return FeatureTestStatus::PartiallyPassed;
    }
    if counts.skipped > 0 && counts.passed == 0 {
        return FeatureTestStatus::Skipped;
    }
    FeatureTestStatus::NotTested
}

/// Build the enhanced view of one feature.
///
/// A feature is implemented when it is manually marked or when every mapped
/// test passed; `implementation_source` records which rule applied.
pub fn aggregate(
    name: &str,
    feature: Option<&Feature>,
    verification: &FeatureVerification,
    tests: Vec<MappedTestStatus>,
) -> EnhancedFeatureStatus {
    let counts = count_tests(&tests);
    let test_status = derive_test_status(&counts);
    let last_tested = tests.iter().filter_map(|t| t.last_run).max();

    let implementation_source = if verification.implemented {
        ImplementationSource::Manual
    } else if test_status == FeatureTestStatus::Passed {
        ImplementationSource::Tests
    } else {
        ImplementationSource::None
    };
    let implemented = implementation_source != ImplementationSource::None;
    let implemented_at = if implemented {
        verification.last_verified.or(last_tested)
    } else {
        None
    };
    let tested = verification.tested || counts.passed + counts.failed > 0;

    EnhancedFeatureStatus {
        name: name.to_string(),
        area: feature.and_then(|f| f.area.clone()),
        description: feature.and_then(|f| f.description.clone()),
        implemented,
        implementation_source,
        implemented_at,
        tested,
        test_status,
        last_tested,
        counts,
        tests,
        notes: verification.notes.clone(),
    }
}
