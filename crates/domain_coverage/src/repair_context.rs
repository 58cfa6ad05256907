//! Claim-level repair context
//!
//! Labor lines name the repair being performed ("Ölkühler ersetzen") even
//! when the parts lines carry opaque catalog names. The context is derived
//! once per claim, before item-level resolution, and serves both as a
//! disambiguation hint for the keyword matcher and as the second tier of the
//! primary-repair determination.

use serde::{Deserialize, Serialize};

use core_kernel::{normalize, term_in_text};
use domain_policy::{ComponentVocabulary, PolicyContext};

use crate::item::{ItemType, LineItem};

/// What the labor lines say is being repaired
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairContext {
    pub primary_component: Option<String>,
    pub primary_category: Option<String>,
    /// Whether the named component is covered by the policy
    pub is_covered: bool,
    /// The labor description the context was derived from
    pub source_description: Option<String>,
}

impl RepairContext {
    pub fn is_present(&self) -> bool {
        self.primary_component.is_some()
    }
}

/// Derives the repair context from the claim's labor descriptions.
///
/// Labor items are scanned highest price first; the most expensive labor
/// line naming a known repair wins. Phrases are tried longest first so
/// "getriebe olkuhler ersetzen" beats "olkuhler".
pub fn derive_repair_context(
    items: &[LineItem],
    policy: &PolicyContext,
    vocabulary: &ComponentVocabulary,
) -> RepairContext {
    let mut labor: Vec<&LineItem> = items
        .iter()
        .filter(|item| item.item_type == ItemType::Labor)
        .collect();
    labor.sort_by(|a, b| b.total_price.cmp(&a.total_price));

    let mut phrases: Vec<(String, &domain_policy::RepairHint)> = vocabulary
        .repair_context_keywords
        .iter()
        .map(|(phrase, hint)| (normalize(phrase), hint))
        .collect();
    phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));

    for item in labor {
        let text = normalize(&item.description);
        for (phrase, hint) in &phrases {
            if term_in_text(&text, phrase) {
                let category = vocabulary.resolve_category(&hint.category);
                let covered = policy.is_component_covered(&category, &hint.component, vocabulary)
                    || (policy.is_category_covered(&category, vocabulary)
                        && policy.components_for(&category).is_empty());

                tracing::debug!(
                    component = %hint.component,
                    category = %category,
                    covered,
                    source = %item.description,
                    "repair context derived"
                );

                return RepairContext {
                    primary_component: Some(hint.component.clone()),
                    primary_category: Some(category),
                    is_covered: covered,
                    source_description: Some(item.description.clone()),
                };
            }
        }
    }

    RepairContext::default()
}
