//! Shared assertions

use domain_coverage::{CoverageStatus, LineItemCoverage};

/// Asserts the conservation invariant for every verdict:
/// `covered_amount + not_covered_amount == total_price`.
pub fn assert_conservation(coverages: &[LineItemCoverage]) {
    for (index, coverage) in coverages.iter().enumerate() {
        assert!(
            coverage.conserves_total(),
            "conservation violated at index {index}: {} + {} != {}",
            coverage.covered_amount,
            coverage.not_covered_amount,
            coverage.total_price
        );
    }
}

/// Asserts the verdict sequence matches, in input order.
pub fn assert_statuses(coverages: &[LineItemCoverage], expected: &[CoverageStatus]) {
    let actual: Vec<CoverageStatus> = coverages.iter().map(|c| c.coverage_status).collect();
    assert_eq!(actual, expected, "verdict sequence mismatch");
}
