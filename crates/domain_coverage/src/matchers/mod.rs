//! Matcher stages of the coverage cascade
//!
//! The cascade is an ordered list of strategies implementing [`MatchStage`];
//! per item, the first stage returning a verdict wins and later stages never
//! see the item. Ordering is a cost/determinism trade-off: free deterministic
//! stages run before the model call.

mod keyword;
mod llm;
mod part_number;
mod rules;

pub use keyword::KeywordMatcher;
pub use llm::{ClaimPromptContext, LlmMatcher};
pub use part_number::PartNumberLookup;
pub use rules::RuleEngine;

use domain_policy::{ComponentVocabulary, MatcherThresholds, PolicyContext};

use crate::item::{LineItem, LineItemCoverage};
use crate::repair_context::RepairContext;

/// Read-only context shared by the deterministic stages
pub struct MatchContext<'a> {
    pub policy: &'a PolicyContext,
    pub vocabulary: &'a ComponentVocabulary,
    pub thresholds: &'a MatcherThresholds,
    pub repair_context: &'a RepairContext,
    /// Every item of the claim, for neighboring-item disambiguation
    pub claim_items: &'a [LineItem],
}

/// A deterministic matcher stage.
///
/// Returns `None` when the stage has no verdict, letting the cascade
/// continue; a partial hunch must not consume the item.
pub trait MatchStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, item: &LineItem, ctx: &MatchContext<'_>) -> Option<LineItemCoverage>;
}
