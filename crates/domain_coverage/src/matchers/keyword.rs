//! Multilingual keyword matcher
//!
//! Third stage: scans the normalized description against the tenant's
//! term dictionary. Two correctness rules dominate this stage:
//!
//! * the short-token guard - any term (dictionary or policy side) that
//!   normalizes to three characters or fewer matches only by exact token
//!   equality, never by containment;
//! * context hints - polysemous terms ("ventil") resolve differently near
//!   "hydraulik" than near "motor", looking at neighboring items of the
//!   same claim when the item itself is terse.

use core_kernel::{canonical_key, normalize, term_in_text};
use domain_policy::TermEntry;

use crate::item::{LineItem, LineItemCoverage, MatchMethod};
use crate::matchers::{MatchContext, MatchStage};

const BASE_CONFIDENCE: f64 = 0.85;
const HINT_CONFIDENCE: f64 = 0.90;
const CATCH_ALL_CONFIDENCE: f64 = 0.70;
const CROSS_CATEGORY_FACTOR: f64 = 0.95;

struct Candidate {
    component: String,
    category: String,
    confidence: f64,
    via: String,
}

/// Stage 3: dictionary term matching with contextual disambiguation
pub struct KeywordMatcher {
    entries: Vec<TermEntry>,
}

impl KeywordMatcher {
    pub fn from_vocabulary(vocabulary: &domain_policy::ComponentVocabulary) -> Self {
        Self {
            entries: vocabulary.term_entries(),
        }
    }

    /// Checks whether a context term appears in this item or a neighbor.
    fn context_present(context: &str, text: &str, ctx: &MatchContext<'_>) -> bool {
        if term_in_text(text, context) {
            return true;
        }
        ctx.claim_items
            .iter()
            .any(|neighbor| term_in_text(&normalize(&neighbor.description), context))
    }

    fn find_candidate(&self, text: &str, ctx: &MatchContext<'_>) -> Option<Candidate> {
        // Context hints take precedence over the flat dictionary.
        for hint in &ctx.vocabulary.context_hints {
            let term = normalize(&hint.term);
            if term_in_text(text, &term)
                && Self::context_present(&normalize(&hint.context), text, ctx)
            {
                return Some(Candidate {
                    component: hint.component.clone(),
                    category: ctx.vocabulary.resolve_category(&hint.category),
                    confidence: HINT_CONFIDENCE,
                    via: format!("term '{}' near '{}'", hint.term, hint.context),
                });
            }
        }

        // Dictionary scan, longest terms first. When several components
        // match, the one named by the claim's repair context wins.
        let matches: Vec<&TermEntry> = self
            .entries
            .iter()
            .filter(|entry| term_in_text(text, &entry.term))
            .collect();

        let preferred = ctx.repair_context.primary_component.as_deref().and_then(|primary| {
            let primary = canonical_key(primary);
            matches.iter().find(|e| canonical_key(&e.component) == primary)
        });

        if let Some(entry) = preferred.or_else(|| matches.first()) {
            return Some(Candidate {
                component: entry.component.clone(),
                category: entry.category.clone(),
                confidence: BASE_CONFIDENCE,
                via: format!("dictionary term '{}'", entry.term),
            });
        }

        // Catch-all terms map to the configured distribution category.
        if let Some(category) = &ctx.vocabulary.distribution_catch_all_category {
            for term in &ctx.vocabulary.distribution_catch_all_terms {
                let term = normalize(term);
                if term_in_text(text, &term) {
                    return Some(Candidate {
                        component: term.clone(),
                        category: ctx.vocabulary.resolve_category(category),
                        confidence: CATCH_ALL_CONFIDENCE,
                        via: format!("catch-all term '{term}'"),
                    });
                }
            }
        }

        None
    }
}

impl MatchStage for KeywordMatcher {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn evaluate(&self, item: &LineItem, ctx: &MatchContext<'_>) -> Option<LineItemCoverage> {
        let text = normalize(&item.description);
        let mut candidate = self.find_candidate(&text, ctx)?;

        // Gasket/seal wording marks the item as likely ancillary rather than
        // the primary component.
        let gasket = ctx
            .vocabulary
            .gasket_indicators
            .iter()
            .any(|indicator| term_in_text(&text, &normalize(indicator)));
        if gasket {
            candidate.confidence *= ctx.thresholds.gasket_downgrade_factor;
            candidate.via.push_str(", gasket indicator present");
        }

        if candidate.confidence < ctx.thresholds.keyword_accept {
            tracing::debug!(
                description = %item.description,
                confidence = candidate.confidence,
                "keyword candidate below acceptance, yielding to next stage"
            );
            return None;
        }

        let Candidate {
            component,
            category,
            confidence,
            via,
        } = candidate;

        if ctx
            .policy
            .is_component_covered(&category, &component, ctx.vocabulary)
        {
            return Some(LineItemCoverage::covered(
                item,
                MatchMethod::Keyword,
                confidence,
                category,
                component,
                format!("matched {via}"),
            ));
        }

        if !ctx.policy.is_category_covered(&category, ctx.vocabulary) {
            // The resolved category is not covered; the component may still
            // be listed under another covered category. The same short-token
            // guard applies to this search on both sides.
            if let Some(other_category) = ctx
                .policy
                .find_component_in_any_category(&component, ctx.vocabulary)
            {
                return Some(LineItemCoverage::covered(
                    item,
                    MatchMethod::Keyword,
                    confidence * CROSS_CATEGORY_FACTOR,
                    other_category.clone(),
                    component,
                    format!("matched {via}, listed under covered category '{other_category}'"),
                ));
            }
            return Some(
                LineItemCoverage::not_covered(
                    item,
                    MatchMethod::Keyword,
                    confidence,
                    format!("matched {via}, category '{category}' not covered by policy"),
                )
                .with_match(category, component),
            );
        }

        Some(
            LineItemCoverage::not_covered(
                item,
                MatchMethod::Keyword,
                confidence,
                format!("matched {via}, component not in covered list"),
            )
            .with_match(category, component),
        )
    }
}
