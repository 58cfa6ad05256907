//! Line items and per-item coverage verdicts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of estimate row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Parts,
    Labor,
    Fee,
}

/// Terminal coverage verdict for a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageStatus {
    Covered,
    NotCovered,
    ReviewNeeded,
}

/// Which cascade stage produced the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Rule,
    PartNumber,
    Keyword,
    Llm,
}

/// One row of a repair cost estimate
///
/// Immutable input produced by the upstream extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Raw description as printed on the estimate
    pub description: String,
    pub item_type: ItemType,
    pub total_price: Decimal,
    /// Vendor catalog identifier, when the estimate carries one
    #[serde(default)]
    pub part_code: Option<String>,
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        item_type: ItemType,
        total_price: Decimal,
        part_code: Option<String>,
    ) -> Self {
        Self {
            description: description.into(),
            item_type,
            total_price,
            part_code,
        }
    }
}

/// Engine output, one per line item
///
/// Created by exactly one cascade stage and never mutated afterwards, except
/// by the claim-level resolver's promotion/demotion step, which records the
/// original verdict for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemCoverage {
    pub coverage_status: CoverageStatus,
    pub coverage_category: Option<String>,
    pub matched_component: Option<String>,
    pub match_method: MatchMethod,
    /// Confidence in [0, 1]
    pub match_confidence: f64,
    pub match_reasoning: String,
    pub covered_amount: Decimal,
    pub not_covered_amount: Decimal,
    /// Verdict before the claim-level resolver flipped it, if it did
    #[serde(default)]
    pub original_status: Option<CoverageStatus>,
    pub item_type: ItemType,
    pub total_price: Decimal,
}

impl LineItemCoverage {
    /// A COVERED verdict: the full item price is covered.
    pub fn covered(
        item: &LineItem,
        method: MatchMethod,
        confidence: f64,
        category: impl Into<String>,
        component: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            coverage_status: CoverageStatus::Covered,
            coverage_category: Some(category.into()),
            matched_component: Some(component.into()),
            match_method: method,
            match_confidence: confidence,
            match_reasoning: reasoning.into(),
            covered_amount: item.total_price,
            not_covered_amount: Decimal::ZERO,
            original_status: None,
            item_type: item.item_type,
            total_price: item.total_price,
        }
    }

    /// A NOT_COVERED verdict: nothing is payable for this item.
    pub fn not_covered(
        item: &LineItem,
        method: MatchMethod,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            coverage_status: CoverageStatus::NotCovered,
            coverage_category: None,
            matched_component: None,
            match_method: method,
            match_confidence: confidence,
            match_reasoning: reasoning.into(),
            covered_amount: Decimal::ZERO,
            not_covered_amount: item.total_price,
            original_status: None,
            item_type: item.item_type,
            total_price: item.total_price,
        }
    }

    /// A REVIEW_NEEDED verdict: nothing is payable until a human decides.
    pub fn review_needed(
        item: &LineItem,
        method: MatchMethod,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            coverage_status: CoverageStatus::ReviewNeeded,
            coverage_category: None,
            matched_component: None,
            match_method: method,
            match_confidence: confidence,
            match_reasoning: reasoning.into(),
            covered_amount: Decimal::ZERO,
            not_covered_amount: item.total_price,
            original_status: None,
            item_type: item.item_type,
            total_price: item.total_price,
        }
    }

    /// Attaches the matched component to a non-covered verdict.
    pub fn with_match(
        mut self,
        category: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        self.coverage_category = Some(category.into());
        self.matched_component = Some(component.into());
        self
    }

    /// Resolver promotion: NOT_COVERED/REVIEW_NEEDED -> COVERED.
    ///
    /// Records the original verdict the first time the resolver flips this
    /// item.
    pub fn promote_to_covered(&mut self, reasoning: &str) {
        if self.original_status.is_none() {
            self.original_status = Some(self.coverage_status);
        }
        self.coverage_status = CoverageStatus::Covered;
        self.covered_amount = self.total_price;
        self.not_covered_amount = Decimal::ZERO;
        self.match_reasoning = format!("{}; {}", self.match_reasoning, reasoning);
        self.assert_conservation();
    }

    /// Resolver demotion: COVERED -> NOT_COVERED.
    pub fn demote_to_not_covered(&mut self, reasoning: &str) {
        if self.original_status.is_none() {
            self.original_status = Some(self.coverage_status);
        }
        self.coverage_status = CoverageStatus::NotCovered;
        self.covered_amount = Decimal::ZERO;
        self.not_covered_amount = self.total_price;
        self.match_reasoning = format!("{}; {}", self.match_reasoning, reasoning);
        self.assert_conservation();
    }

    /// Checks the conservation invariant:
    /// `covered_amount + not_covered_amount == total_price`.
    pub fn conserves_total(&self) -> bool {
        self.covered_amount + self.not_covered_amount == self.total_price
    }

    /// Raises loudly in debug builds, clamps defensively in release.
    pub(crate) fn assert_conservation(&mut self) {
        if !self.conserves_total() {
            debug_assert!(
                false,
                "conservation violated: {} + {} != {}",
                self.covered_amount, self.not_covered_amount, self.total_price
            );
            tracing::error!(
                covered = %self.covered_amount,
                not_covered = %self.not_covered_amount,
                total = %self.total_price,
                "conservation violated, clamping"
            );
            self.not_covered_amount = self.total_price - self.covered_amount;
        }
    }
}
