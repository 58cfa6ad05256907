//! Payout calculation
//!
//! Deterministic conversion of covered-item totals into the payable amount.
//! The step order is fixed: subtotal, coverage tier, cap, VAT, deductible,
//! company VAT reclaim, zero clamp. Reordering the deductible and VAT steps
//! changes the result on real claims, so each intermediate value is carried
//! in the result for audit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{normalize, Money, Rate};
use domain_policy::{PayoutSettings, PolicyContext};

use crate::error::CoverageError;
use crate::item::{CoverageStatus, LineItemCoverage};

/// Itemized payout breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResult {
    /// Sum of covered items' prices
    pub covered_subtotal: Money,
    /// Effective tier percentage applied
    pub coverage_percent: Decimal,
    /// Subtotal after the percentage, before the cap
    pub gross_covered: Money,
    pub cap_applied: bool,
    pub vat_rate: Decimal,
    /// Gross covered amount including VAT
    pub vat_inclusive: Money,
    /// max(excess_percent x vat_inclusive, excess_minimum)
    pub deductible: Money,
    /// Whether reclaimable VAT was removed for a company policyholder
    pub vat_reclaim_applied: bool,
    /// Final amount, clamped at zero
    pub payable: Money,
}

/// Converts covered items into a payable amount under the policy's terms
pub struct PayoutCalculator {
    settings: PayoutSettings,
}

impl PayoutCalculator {
    pub fn new(settings: PayoutSettings) -> Self {
        Self { settings }
    }

    /// Computes the claim payout from the final per-item verdicts.
    pub fn compute(
        &self,
        coverages: &[LineItemCoverage],
        policy: &PolicyContext,
    ) -> Result<PayoutResult, CoverageError> {
        // 1. Covered subtotal. REVIEW_NEEDED items pay nothing until a human
        // decides.
        let subtotal: Decimal = coverages
            .iter()
            .filter(|c| c.coverage_status == CoverageStatus::Covered)
            .map(|c| c.covered_amount)
            .sum();
        let covered_subtotal = Money::new(subtotal, policy.currency);

        // 2. Mileage/age coverage tier.
        let coverage_percent = policy.effective_coverage_percent()?;

        // 3. Apply the percentage.
        let mut gross_covered = covered_subtotal
            .multiply(coverage_percent / dec!(100))
            .round_to_currency();

        // 4. Cap.
        let cap_applied = gross_covered.amount() > policy.max_coverage.amount();
        if cap_applied {
            gross_covered = policy.max_coverage;
        }

        // 5. VAT.
        let vat = Rate::from_percentage(policy.vat_rate);
        let vat_inclusive = gross_covered
            .checked_add(&vat.apply(&gross_covered))?
            .round_to_currency();

        // 6. Deductible, with floor.
        let percentage_excess = Rate::from_percentage(policy.excess_percent)
            .apply(&vat_inclusive)
            .round_to_currency();
        let deductible = percentage_excess.max(&policy.excess_minimum)?;

        // 7. Subtract deductible.
        let mut payable = vat_inclusive.checked_sub(&deductible)?;

        // 8. Companies reclaim VAT, individuals do not.
        let vat_reclaim_applied = self.is_company(policy.policyholder_name.as_deref());
        if vat_reclaim_applied && payable.is_positive() {
            payable = payable.divide(dec!(1) + vat.as_decimal())?;
        }

        let payable = payable.clamp_non_negative().round_to_currency();

        tracing::debug!(
            subtotal = %covered_subtotal,
            percent = %coverage_percent,
            payable = %payable,
            cap_applied,
            vat_reclaim_applied,
            "payout computed"
        );

        Ok(PayoutResult {
            covered_subtotal,
            coverage_percent,
            gross_covered,
            cap_applied,
            vat_rate: policy.vat_rate,
            vat_inclusive,
            deductible,
            vat_reclaim_applied,
            payable,
        })
    }

    /// Legal-entity-suffix heuristic. Not authoritative: when no name is
    /// available or no suffix matches, no VAT reclaim is deducted and the
    /// flag in the result lets reviewers spot the assumption.
    fn is_company(&self, policyholder_name: Option<&str>) -> bool {
        let Some(name) = policyholder_name else {
            return false;
        };
        let normalized = normalize(name);
        let Some(last_token) = normalized.split_whitespace().last() else {
            return false;
        };
        self.settings
            .legal_entity_suffixes
            .iter()
            .any(|suffix| normalize(suffix) == last_token)
    }
}
