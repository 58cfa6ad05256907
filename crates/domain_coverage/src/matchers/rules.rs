//! Deterministic pattern rules
//!
//! Zero-cost first stage: fees, explicit exclusions (disposal, cleaning,
//! rental car, diagnostic-only labor), and consumables are never covered,
//! whatever the rest of the claim looks like. Patterns come from tenant
//! configuration; German and French variants belong in the same table.

use regex::Regex;

use domain_policy::{ComponentVocabulary, PatternRule};

use core_kernel::normalize;

use crate::error::CoverageError;
use crate::item::{ItemType, LineItem, LineItemCoverage, MatchMethod};
use crate::matchers::{MatchContext, MatchStage};

/// Verdicts from this stage are certain by construction.
const RULE_CONFIDENCE: f64 = 1.0;

struct CompiledRule {
    label: String,
    pattern: Regex,
}

fn compile(rules: &[PatternRule]) -> Result<Vec<CompiledRule>, CoverageError> {
    rules
        .iter()
        .map(|rule| {
            Regex::new(&rule.pattern)
                .map(|pattern| CompiledRule {
                    label: rule.label.clone(),
                    pattern,
                })
                .map_err(|e| {
                    CoverageError::Invariant(format!(
                        "pattern '{}' failed to compile after validation: {e}",
                        rule.label
                    ))
                })
        })
        .collect()
}

/// Stage 1: always-excluded items
pub struct RuleEngine {
    exclusions: Vec<CompiledRule>,
    consumables: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Compiles the tenant's pattern tables.
    pub fn from_vocabulary(vocabulary: &ComponentVocabulary) -> Result<Self, CoverageError> {
        Ok(Self {
            exclusions: compile(&vocabulary.exclusion_patterns)?,
            consumables: compile(&vocabulary.consumable_patterns)?,
        })
    }

    fn first_match<'a>(rules: &'a [CompiledRule], text: &str) -> Option<&'a CompiledRule> {
        rules.iter().find(|rule| rule.pattern.is_match(text))
    }
}

impl MatchStage for RuleEngine {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn evaluate(&self, item: &LineItem, _ctx: &MatchContext<'_>) -> Option<LineItemCoverage> {
        if item.item_type == ItemType::Fee {
            return Some(LineItemCoverage::not_covered(
                item,
                MatchMethod::Rule,
                RULE_CONFIDENCE,
                "fee items are never covered",
            ));
        }

        let text = normalize(&item.description);

        if let Some(rule) = Self::first_match(&self.exclusions, &text) {
            tracing::debug!(description = %item.description, rule = %rule.label, "exclusion rule fired");
            return Some(LineItemCoverage::not_covered(
                item,
                MatchMethod::Rule,
                RULE_CONFIDENCE,
                format!("matched exclusion rule '{}'", rule.label),
            ));
        }

        if let Some(rule) = Self::first_match(&self.consumables, &text) {
            tracing::debug!(description = %item.description, rule = %rule.label, "consumable rule fired");
            return Some(LineItemCoverage::not_covered(
                item,
                MatchMethod::Rule,
                RULE_CONFIDENCE,
                format!("matched consumable rule '{}'", rule.label),
            ));
        }

        None
    }
}
