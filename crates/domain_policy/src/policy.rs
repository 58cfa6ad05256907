//! Policy context for a single claim analysis
//!
//! The [`PolicyContext`] is populated by the upstream document-extraction
//! stage and is read-only during analysis. It answers two questions for the
//! matcher cascade: is this category/component financially covered, and what
//! percentage of a covered repair does the policy pay at the vehicle's
//! current mileage and age.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use core_kernel::{canonical_key, normalize, terms_equivalent, Currency, Money};

use crate::error::PolicyError;
use crate::vocabulary::ComponentVocabulary;

/// One step of the mileage-based coverage scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageTier {
    /// Tier applies once vehicle mileage reaches this threshold
    pub km_threshold: u32,
    /// Percentage of the covered subtotal paid at this tier (e.g. 80)
    pub coverage_percent: Decimal,
    /// Replacement percentage once the vehicle exceeds the policy age
    /// threshold. When absent, the mileage percent stands regardless of age.
    #[serde(default)]
    pub age_coverage_percent: Option<Decimal>,
}

/// Per-claim policy snapshot, loaded once and read-only during analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyContext {
    /// Category names the policy covers (canonical, normalized form)
    pub covered_categories: BTreeSet<String>,
    /// Covered component list per category
    pub covered_components: HashMap<String, Vec<String>>,
    /// Components explicitly excluded regardless of category
    #[serde(default)]
    pub excluded_components: Vec<String>,
    /// Ordered mileage tiers; empty scale is a policy defect
    pub coverage_scale: Vec<CoverageTier>,
    /// Vehicle age at which age_coverage_percent replaces the mileage percent
    #[serde(default)]
    pub age_threshold_years: Option<u32>,
    /// Cap on the gross covered amount
    pub max_coverage: Money,
    /// Deductible percentage applied to the VAT-inclusive amount (e.g. 10)
    pub excess_percent: Decimal,
    /// Deductible floor
    pub excess_minimum: Money,
    /// VAT percentage supplied by the policy (e.g. 8.1)
    pub vat_rate: Decimal,
    /// Vehicle mileage at loss date
    pub vehicle_km: u32,
    /// Vehicle age in years at loss date
    pub vehicle_age_years: u32,
    /// Settlement currency
    pub currency: Currency,
    /// Policyholder name as printed on the policy, used only by the
    /// company-VAT heuristic
    #[serde(default)]
    pub policyholder_name: Option<String>,
}

impl PolicyContext {
    /// Checks whether a category (or one of its configured aliases) is covered
    pub fn is_category_covered(&self, category: &str, vocabulary: &ComponentVocabulary) -> bool {
        let canonical = vocabulary.resolve_category(category);
        self.covered_categories
            .iter()
            .any(|c| canonical_key(c) == canonical)
    }

    /// Returns the covered component list for a category
    pub fn components_for(&self, category: &str) -> &[String] {
        let key = canonical_key(category);
        self.covered_components
            .iter()
            .find(|(c, _)| canonical_key(c) == key)
            .map(|(_, components)| components.as_slice())
            .unwrap_or_default()
    }

    /// Checks whether a component is in a category's covered list, either
    /// directly or via a component synonym. Comparisons honor the short-token
    /// guard on both sides.
    pub fn is_component_covered(
        &self,
        category: &str,
        component: &str,
        vocabulary: &ComponentVocabulary,
    ) -> bool {
        if !self.is_category_covered(category, vocabulary) {
            return false;
        }
        let canonical = vocabulary.resolve_category(category);
        let candidates = vocabulary.expand_component(component);
        self.components_for(&canonical).iter().any(|listed| {
            let listed = normalize(listed);
            candidates
                .iter()
                .any(|candidate| terms_equivalent(&listed, candidate))
        })
    }

    /// Searches every covered category for a component match.
    ///
    /// Returns the category that lists the component. Used by the keyword
    /// matcher's cross-category fallback; the same guard applies.
    pub fn find_component_in_any_category(
        &self,
        component: &str,
        vocabulary: &ComponentVocabulary,
    ) -> Option<String> {
        let candidates = vocabulary.expand_component(component);
        self.covered_categories.iter().find_map(|category| {
            let hit = self.components_for(category).iter().any(|listed| {
                let listed = normalize(listed);
                candidates
                    .iter()
                    .any(|candidate| terms_equivalent(&listed, candidate))
            });
            hit.then(|| category.clone())
        })
    }

    /// Checks whether a component is explicitly excluded
    pub fn is_component_excluded(&self, component: &str, vocabulary: &ComponentVocabulary) -> bool {
        let candidates = vocabulary.expand_component(component);
        self.excluded_components.iter().any(|excluded| {
            let excluded = normalize(excluded);
            candidates
                .iter()
                .any(|candidate| terms_equivalent(&excluded, candidate))
        })
    }

    /// Selects the effective coverage percentage for this vehicle.
    ///
    /// Picks the tier whose km threshold is the highest one at or below the
    /// vehicle's mileage; below the first threshold the policy pays 100%.
    /// Once the vehicle exceeds the age threshold, the tier's age percentage
    /// replaces the mileage percentage - but only when that tier defines one.
    pub fn effective_coverage_percent(&self) -> Result<Decimal, PolicyError> {
        if self.coverage_scale.is_empty() {
            return Err(PolicyError::EmptyCoverageScale);
        }

        let mut tiers: Vec<&CoverageTier> = self.coverage_scale.iter().collect();
        tiers.sort_by_key(|t| t.km_threshold);

        let selected = tiers
            .iter()
            .rev()
            .find(|t| t.km_threshold <= self.vehicle_km);

        let Some(tier) = selected else {
            // Below the first threshold the scale has not kicked in yet.
            return Ok(dec!(100));
        };

        let age_exceeded = self
            .age_threshold_years
            .map(|threshold| self.vehicle_age_years >= threshold)
            .unwrap_or(false);

        if age_exceeded {
            if let Some(age_percent) = tier.age_coverage_percent {
                return Ok(age_percent);
            }
        }

        Ok(tier.coverage_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::ComponentVocabulary;

    fn scale() -> Vec<CoverageTier> {
        vec![
            CoverageTier {
                km_threshold: 50_000,
                coverage_percent: dec!(80),
                age_coverage_percent: Some(dec!(60)),
            },
            CoverageTier {
                km_threshold: 100_000,
                coverage_percent: dec!(60),
                age_coverage_percent: None,
            },
        ]
    }

    fn context(km: u32, age: u32) -> PolicyContext {
        PolicyContext {
            covered_categories: BTreeSet::from(["engine".to_string()]),
            covered_components: HashMap::from([(
                "engine".to_string(),
                vec!["oil_cooler".to_string()],
            )]),
            excluded_components: Vec::new(),
            coverage_scale: scale(),
            age_threshold_years: Some(8),
            max_coverage: Money::new(dec!(5000), Currency::CHF),
            excess_percent: dec!(10),
            excess_minimum: Money::new(dec!(150), Currency::CHF),
            vat_rate: dec!(8.1),
            vehicle_km: km,
            vehicle_age_years: age,
            currency: Currency::CHF,
            policyholder_name: None,
        }
    }

    #[test]
    fn test_below_first_threshold_pays_full() {
        let ctx = context(30_000, 3);
        assert_eq!(ctx.effective_coverage_percent().unwrap(), dec!(100));
    }

    #[test]
    fn test_highest_threshold_at_or_below_mileage_wins() {
        let ctx = context(75_000, 3);
        assert_eq!(ctx.effective_coverage_percent().unwrap(), dec!(80));

        let ctx = context(100_000, 3);
        assert_eq!(ctx.effective_coverage_percent().unwrap(), dec!(60));
    }

    #[test]
    fn test_age_override_uses_tier_age_percent() {
        let ctx = context(75_000, 12);
        assert_eq!(ctx.effective_coverage_percent().unwrap(), dec!(60));
    }

    #[test]
    fn test_age_override_skipped_when_tier_defines_no_age_rate() {
        // The 100k tier has no age rate; the mileage percent stands even for
        // an old vehicle.
        let ctx = context(120_000, 12);
        assert_eq!(ctx.effective_coverage_percent().unwrap(), dec!(60));
    }

    #[test]
    fn test_empty_scale_is_an_error() {
        let mut ctx = context(10_000, 1);
        ctx.coverage_scale.clear();
        assert!(matches!(
            ctx.effective_coverage_percent(),
            Err(PolicyError::EmptyCoverageScale)
        ));
    }

    #[test]
    fn test_component_covered_via_synonym() {
        let ctx = context(10_000, 1);
        let vocabulary = ComponentVocabulary::minimal_for_tests();
        assert!(ctx.is_component_covered("engine", "olkuhler", &vocabulary));
        assert!(!ctx.is_component_covered("engine", "wasserpumpe", &vocabulary));
    }

    #[test]
    fn test_short_component_name_requires_exact_listing() {
        let mut ctx = context(10_000, 1);
        ctx.covered_components
            .get_mut("engine")
            .unwrap()
            .push("abgasrueckfuehrung".to_string());
        let vocabulary = ComponentVocabulary::minimal_for_tests();
        // "asr" must not ride on the substring overlap with the EGR entry.
        assert!(!ctx.is_component_covered("engine", "asr", &vocabulary));
    }
}
