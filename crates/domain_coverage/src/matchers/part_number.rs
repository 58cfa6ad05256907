//! Catalog part-number lookup
//!
//! Second stage: an exact hit in the policy-independent part catalog is the
//! strongest signal after the deterministic rules. The catalog resolves a
//! code to a component; whether that component is financially covered is
//! still the policy's call.

use core_kernel::{normalize, normalize_part_code, term_in_text};

use crate::item::{LineItem, LineItemCoverage, MatchMethod};
use crate::matchers::{MatchContext, MatchStage};

const PART_NUMBER_CONFIDENCE: f64 = 0.95;

/// Stage 2: exact/normalized catalog lookup
pub struct PartNumberLookup;

impl PartNumberLookup {
    /// Turns a catalog hit into a coverage verdict against the policy.
    fn classify_hit(
        item: &LineItem,
        entry: &domain_policy::CatalogEntry,
        via: &str,
        ctx: &MatchContext<'_>,
    ) -> LineItemCoverage {
        let category = ctx.vocabulary.resolve_category(&entry.category);
        let component = entry.component.clone();

        if ctx
            .policy
            .is_component_covered(&category, &component, ctx.vocabulary)
        {
            return LineItemCoverage::covered(
                item,
                MatchMethod::PartNumber,
                PART_NUMBER_CONFIDENCE,
                category,
                component,
                format!("catalog {via} resolved to covered component"),
            );
        }

        if !ctx.policy.is_category_covered(&category, ctx.vocabulary) {
            // The catalog knows the part but the policy does not list its
            // category. Tenants can opt into routing these to review instead
            // of denying outright.
            if let Some(confidence) = ctx.thresholds.catalog_extension_confidence {
                return LineItemCoverage::review_needed(
                    item,
                    MatchMethod::PartNumber,
                    confidence,
                    format!("catalog {via} resolved to category '{category}' not listed by policy"),
                )
                .with_match(category, component);
            }
            return LineItemCoverage::not_covered(
                item,
                MatchMethod::PartNumber,
                PART_NUMBER_CONFIDENCE,
                format!("catalog {via} resolved to category '{category}' not covered by policy"),
            )
            .with_match(category, component);
        }

        LineItemCoverage::not_covered(
            item,
            MatchMethod::PartNumber,
            PART_NUMBER_CONFIDENCE,
            "component not in policy list",
        )
        .with_match(category, component)
    }
}

impl MatchStage for PartNumberLookup {
    fn name(&self) -> &'static str {
        "part_number"
    }

    fn evaluate(&self, item: &LineItem, ctx: &MatchContext<'_>) -> Option<LineItemCoverage> {
        let catalog = &ctx.vocabulary.part_catalog;

        if let Some(code) = item.part_code.as_deref() {
            let code = normalize_part_code(code);
            if !code.is_empty() {
                let hit = catalog
                    .by_part_number
                    .iter()
                    .find(|(catalog_code, _)| normalize_part_code(catalog_code) == code);
                if let Some((_, entry)) = hit {
                    tracing::debug!(code = %code, component = %entry.component, "part number hit");
                    return Some(Self::classify_hit(item, entry, "code", ctx));
                }
            }
        }

        // Secondary lookup: catalog keywords inside the description.
        let text = normalize(&item.description);
        let keyword_hit = catalog
            .by_keyword
            .iter()
            .find(|(keyword, _)| term_in_text(&text, &normalize(keyword)));
        if let Some((keyword, entry)) = keyword_hit {
            tracing::debug!(keyword = %keyword, component = %entry.component, "catalog keyword hit");
            return Some(Self::classify_hit(item, entry, "keyword", ctx));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{CoverageStatus, ItemType};
    use crate::repair_context::RepairContext;
    use core_kernel::{Currency, Money};
    use domain_policy::{CatalogEntry, ComponentVocabulary, EngineSettings, PartCatalog, PolicyContext};
    use rust_decimal_macros::dec;
    use std::collections::{BTreeSet, HashMap};

    fn vocabulary() -> ComponentVocabulary {
        ComponentVocabulary {
            component_synonyms: HashMap::from([(
                "oil_cooler".to_string(),
                vec!["olkuhler".to_string()],
            )]),
            component_categories: HashMap::from([("oil_cooler".to_string(), "engine".to_string())]),
            part_catalog: PartCatalog {
                by_part_number: HashMap::from([
                    (
                        "11427525333".to_string(),
                        CatalogEntry {
                            component: "oil_cooler".to_string(),
                            category: "engine".to_string(),
                        },
                    ),
                    (
                        "34116850885".to_string(),
                        CatalogEntry {
                            component: "brake_disc".to_string(),
                            category: "brakes".to_string(),
                        },
                    ),
                ]),
                by_keyword: HashMap::from([(
                    "olkuhlergehause".to_string(),
                    CatalogEntry {
                        component: "oil_cooler".to_string(),
                        category: "engine".to_string(),
                    },
                )]),
            },
            ..Default::default()
        }
    }

    fn policy() -> PolicyContext {
        PolicyContext {
            covered_categories: BTreeSet::from(["engine".to_string()]),
            covered_components: HashMap::from([(
                "engine".to_string(),
                vec!["oil_cooler".to_string()],
            )]),
            excluded_components: Vec::new(),
            coverage_scale: Vec::new(),
            age_threshold_years: None,
            max_coverage: Money::new(dec!(5000), Currency::CHF),
            excess_percent: dec!(10),
            excess_minimum: Money::new(dec!(150), Currency::CHF),
            vat_rate: dec!(8.1),
            vehicle_km: 40_000,
            vehicle_age_years: 4,
            currency: Currency::CHF,
            policyholder_name: None,
        }
    }

    fn evaluate_with(
        item: &LineItem,
        thresholds: &domain_policy::MatcherThresholds,
    ) -> Option<LineItemCoverage> {
        let vocabulary = vocabulary();
        let policy = policy();
        let repair_context = RepairContext::default();
        let ctx = MatchContext {
            policy: &policy,
            vocabulary: &vocabulary,
            thresholds,
            repair_context: &repair_context,
            claim_items: &[],
        };
        PartNumberLookup.evaluate(item, &ctx)
    }

    fn evaluate(item: &LineItem) -> Option<LineItemCoverage> {
        evaluate_with(item, &EngineSettings::default().thresholds)
    }

    #[test]
    fn test_code_hit_with_separator_noise() {
        let item = LineItem::new(
            "Gehäuse",
            ItemType::Parts,
            dec!(458.60),
            Some("11 42-7 525 333".to_string()),
        );
        let verdict = evaluate(&item).unwrap();
        assert_eq!(verdict.coverage_status, CoverageStatus::Covered);
        assert_eq!(verdict.match_confidence, 0.95);
        assert_eq!(verdict.matched_component.as_deref(), Some("oil_cooler"));
    }

    #[test]
    fn test_uncovered_category_is_denied_by_default() {
        let item = LineItem::new(
            "Bremsscheibe",
            ItemType::Parts,
            dec!(220.00),
            Some("34116850885".to_string()),
        );
        let verdict = evaluate(&item).unwrap();
        assert_eq!(verdict.coverage_status, CoverageStatus::NotCovered);
        assert!(verdict.match_reasoning.contains("not covered by policy"));
    }

    #[test]
    fn test_uncovered_category_routes_to_review_when_configured() {
        let mut thresholds = EngineSettings::default().thresholds;
        thresholds.catalog_extension_confidence = Some(0.55);
        let item = LineItem::new(
            "Bremsscheibe",
            ItemType::Parts,
            dec!(220.00),
            Some("34116850885".to_string()),
        );
        let verdict = evaluate_with(&item, &thresholds).unwrap();
        assert_eq!(verdict.coverage_status, CoverageStatus::ReviewNeeded);
        assert_eq!(verdict.match_confidence, 0.55);
    }

    #[test]
    fn test_keyword_fallback() {
        let item = LineItem::new("Ölkühlergehäuse kpl.", ItemType::Parts, dec!(458.60), None);
        let verdict = evaluate(&item).unwrap();
        assert_eq!(verdict.coverage_status, CoverageStatus::Covered);
        assert!(verdict.match_reasoning.contains("keyword"));
    }

    #[test]
    fn test_unknown_code_and_description_yields_none() {
        let item = LineItem::new(
            "Wasserpumpe",
            ItemType::Parts,
            dec!(310.00),
            Some("99999999".to_string()),
        );
        assert!(evaluate(&item).is_none());
    }
}
