//! Claim-level resolution
//!
//! Runs once per claim after the cascade has produced every per-item
//! verdict, as an explicit sequence of named phases:
//!
//! 1. primary-repair determination (covered item, repair context, LLM, none)
//! 2. repair-association validation (one LLM call; may rescue denied parts)
//! 3. labor reconciliation (demote unanchored labor, promote rescued labor)
//! 4. excluded-component veto
//!
//! Every flip records the original verdict on the item for audit.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{normalize, term_in_text};
use domain_policy::{ComponentVocabulary, EngineSettings, PolicyContext};

use crate::audit::{AuditEntry, AuditSink, CallCounter};
use crate::item::{CoverageStatus, ItemType, LineItem, LineItemCoverage, MatchMethod};
use crate::llm::{
    AssociationRequest, DeniedPart, LanguageModel, LlmError, LlmResponse, PrimaryRepairRequest,
    RequestContext,
};
use crate::repair_context::RepairContext;

/// Confidence assigned when the repair context tier decides the primary
const REPAIR_CONTEXT_CONFIDENCE: f64 = 0.70;

/// Which tier determined the primary repair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeterminationMethod {
    CoveredItem,
    RepairContext,
    Llm,
    None,
}

/// Claim-level singleton naming the main reason for the claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryRepairResult {
    pub component: Option<String>,
    pub category: Option<String>,
    pub is_covered: bool,
    pub confidence: f64,
    pub determination_method: DeterminationMethod,
    pub reasoning: String,
}

impl PrimaryRepairResult {
    fn undetermined() -> Self {
        Self {
            component: None,
            category: None,
            is_covered: false,
            confidence: 0.0,
            determination_method: DeterminationMethod::None,
            reasoning: "no primary repair could be determined".to_string(),
        }
    }
}

/// State machine over the full per-item verdict list
pub struct ClaimResolver {
    model: Arc<dyn LanguageModel>,
    audit: Arc<dyn AuditSink>,
    counter: Arc<CallCounter>,
    settings: EngineSettings,
}

impl ClaimResolver {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        audit: Arc<dyn AuditSink>,
        counter: Arc<CallCounter>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            model,
            audit,
            counter,
            settings,
        }
    }

    /// Resolves the claim. Mutates `coverages` in place (promotion/demotion
    /// only, with original verdicts recorded) and returns the primary-repair
    /// determination.
    pub async fn resolve(
        &self,
        items: &[LineItem],
        coverages: &mut [LineItemCoverage],
        repair_context: &RepairContext,
        policy: &PolicyContext,
        vocabulary: &ComponentVocabulary,
    ) -> PrimaryRepairResult {
        let mut primary = self
            .determine_primary(items, coverages, repair_context, policy, vocabulary)
            .await;

        self.validate_associations(items, coverages, &primary, repair_context)
            .await;

        Self::reconcile_labor(coverages);

        // A primary anchored on an item that labor reconciliation demoted no
        // longer has a covered basis.
        if primary.determination_method == DeterminationMethod::CoveredItem
            && !coverages
                .iter()
                .any(|c| c.coverage_status == CoverageStatus::Covered)
        {
            primary.is_covered = false;
            primary.reasoning = format!("{}; anchoring item was demoted", primary.reasoning);
        }

        Self::apply_excluded_veto(items, coverages, &mut primary, policy, vocabulary);

        tracing::info!(
            component = ?primary.component,
            method = ?primary.determination_method,
            covered = primary.is_covered,
            confidence = primary.confidence,
            "primary repair resolved"
        );

        primary
    }

    /// Phase 1: three-tier primary-repair determination.
    async fn determine_primary(
        &self,
        items: &[LineItem],
        coverages: &[LineItemCoverage],
        repair_context: &RepairContext,
        policy: &PolicyContext,
        vocabulary: &ComponentVocabulary,
    ) -> PrimaryRepairResult {
        // Tier 1: highest-value covered parts item, else highest-value
        // covered item of any type.
        let covered_indices: Vec<usize> = coverages
            .iter()
            .enumerate()
            .filter(|(_, c)| c.coverage_status == CoverageStatus::Covered)
            .map(|(i, _)| i)
            .collect();

        let best = |indices: &[usize]| -> Option<usize> {
            indices
                .iter()
                .copied()
                .max_by_key(|&i| items[i].total_price)
        };

        let parts_only: Vec<usize> = covered_indices
            .iter()
            .copied()
            .filter(|&i| items[i].item_type == ItemType::Parts)
            .collect();

        if let Some(index) = best(&parts_only).or_else(|| best(&covered_indices)) {
            let coverage = &coverages[index];
            return PrimaryRepairResult {
                component: coverage.matched_component.clone(),
                category: coverage.coverage_category.clone(),
                is_covered: true,
                confidence: coverage.match_confidence,
                determination_method: DeterminationMethod::CoveredItem,
                reasoning: format!(
                    "highest-value covered item: {}",
                    items[index].description
                ),
            };
        }

        // Tier 2: labor-derived repair context.
        if repair_context.is_present() {
            return PrimaryRepairResult {
                component: repair_context.primary_component.clone(),
                category: repair_context.primary_category.clone(),
                is_covered: repair_context.is_covered,
                confidence: REPAIR_CONTEXT_CONFIDENCE,
                determination_method: DeterminationMethod::RepairContext,
                reasoning: format!(
                    "derived from labor description: {}",
                    repair_context.source_description.as_deref().unwrap_or("")
                ),
            };
        }

        // Tier 3: one LLM call summarizing all items.
        match self.identify_primary_via_llm(items, coverages, policy).await {
            Ok(Some(result)) => {
                // Validate the named component against the policy's covered
                // list before trusting it.
                let mut result = result;
                let component = result.component.clone().unwrap_or_default();
                let validated_category = result
                    .category
                    .as_deref()
                    .filter(|category| {
                        policy.is_component_covered(category, &component, vocabulary)
                    })
                    .map(str::to_string)
                    .or_else(|| policy.find_component_in_any_category(&component, vocabulary));

                match validated_category {
                    Some(category) => {
                        result.category = Some(category);
                        result.is_covered = true;
                    }
                    None => {
                        result.is_covered = false;
                    }
                }
                result
            }
            Ok(None) => PrimaryRepairResult::undetermined(),
            Err(e) => {
                tracing::warn!(error = %e, "primary repair llm call failed");
                PrimaryRepairResult::undetermined()
            }
        }
    }

    async fn identify_primary_via_llm(
        &self,
        items: &[LineItem],
        coverages: &[LineItemCoverage],
        policy: &PolicyContext,
    ) -> Result<Option<PrimaryRepairResult>, LlmError> {
        let request = PrimaryRepairRequest {
            item_summaries: Self::item_summaries(items, coverages),
            covered_components: Self::covered_component_lines(policy),
        };
        let ctx = self.request_context();

        let response = self
            .call_with_retry("identify_primary_repair", &ctx, || {
                self.model.identify_primary_repair(&ctx, &request)
            })
            .await?;

        let verdict = response.value;
        let Some(component) = verdict.component else {
            return Ok(None);
        };

        let t = &self.settings.thresholds;
        Ok(Some(PrimaryRepairResult {
            component: Some(component),
            category: verdict.category,
            is_covered: false,
            confidence: verdict
                .confidence
                .clamp(t.llm_confidence_floor, t.llm_confidence_cap),
            determination_method: DeterminationMethod::Llm,
            reasoning: verdict.reasoning,
        }))
    }

    /// Phase 2: repair-association validation.
    ///
    /// Runs only when a covered repair context exists and at least one part
    /// was denied by the LLM stage. Items denied by the rule engine are never
    /// reconsidered.
    async fn validate_associations(
        &self,
        items: &[LineItem],
        coverages: &mut [LineItemCoverage],
        primary: &PrimaryRepairResult,
        repair_context: &RepairContext,
    ) {
        let covered_context = primary.is_covered || repair_context.is_covered;
        if !covered_context {
            return;
        }

        let Some(primary_component) = primary
            .component
            .clone()
            .or_else(|| repair_context.primary_component.clone())
        else {
            return;
        };
        let primary_category = primary
            .category
            .clone()
            .or_else(|| repair_context.primary_category.clone())
            .unwrap_or_default();

        let denied: Vec<usize> = coverages
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                c.coverage_status == CoverageStatus::NotCovered
                    && c.match_method == MatchMethod::Llm
                    && items[*i].item_type == ItemType::Parts
            })
            .map(|(i, _)| i)
            .collect();

        if denied.is_empty() {
            return;
        }

        let request = AssociationRequest {
            primary_component: primary_component.clone(),
            primary_category: primary_category.clone(),
            item_summaries: Self::item_summaries(items, coverages),
            denied_parts: denied
                .iter()
                .map(|&i| DeniedPart {
                    index: i,
                    description: items[i].description.clone(),
                    total_price: items[i].total_price,
                })
                .collect(),
        };
        let ctx = self.request_context();

        let verdict = match self
            .call_with_retry("validate_associations", &ctx, || {
                self.model.validate_associations(&ctx, &request)
            })
            .await
        {
            Ok(response) => response.value,
            Err(e) => {
                // Rescue is best-effort; a failed call leaves the denials
                // standing.
                tracing::warn!(error = %e, "association validation call failed");
                return;
            }
        };

        for index in verdict.rescued_indices {
            if !denied.contains(&index) {
                tracing::warn!(index, "model rescued an index that was not offered, ignoring");
                continue;
            }
            let coverage = &mut coverages[index];
            coverage.promote_to_covered(&format!(
                "re-evaluated against primary repair '{primary_component}': {}",
                verdict.reasoning
            ));
            coverage.coverage_category = Some(primary_category.clone());
            coverage.matched_component = Some(primary_component.clone());
            tracing::info!(index, "denied part rescued by association validation");
        }
    }

    /// Phase 3: labor promotion/demotion.
    ///
    /// Labor matched to a component is only payable when a covered part
    /// anchors the repair. When phase 2 rescued an anchoring part, labor
    /// demoted on a previous pass is promoted back.
    fn reconcile_labor(coverages: &mut [LineItemCoverage]) {
        let anchor_exists = coverages.iter().any(|c| {
            c.item_type == ItemType::Parts && c.coverage_status == CoverageStatus::Covered
        });

        for coverage in coverages.iter_mut() {
            if coverage.item_type != ItemType::Labor || coverage.matched_component.is_none() {
                continue;
            }
            if anchor_exists {
                if coverage.coverage_status == CoverageStatus::NotCovered
                    && coverage.original_status == Some(CoverageStatus::Covered)
                {
                    coverage.promote_to_covered("anchoring covered part present");
                }
            } else if coverage.coverage_status == CoverageStatus::Covered {
                coverage.demote_to_not_covered("no covered part anchors this labor");
            }
        }
    }

    /// Phase 4: excluded-component veto.
    ///
    /// A large excluded repair must not be approved on the back of a small
    /// ancillary covered item: when the highest-value line of the whole
    /// estimate is an explicitly excluded component, claim-level coverage is
    /// false regardless of lower-value covered items.
    fn apply_excluded_veto(
        items: &[LineItem],
        coverages: &[LineItemCoverage],
        primary: &mut PrimaryRepairResult,
        policy: &PolicyContext,
        vocabulary: &ComponentVocabulary,
    ) {
        let Some(top_index) = (0..items.len()).max_by_key(|&i| items[i].total_price) else {
            return;
        };

        let coverage = &coverages[top_index];
        let by_component = coverage
            .matched_component
            .as_deref()
            .map(|component| policy.is_component_excluded(component, vocabulary))
            .unwrap_or(false);

        let text = normalize(&items[top_index].description);
        let by_description = policy
            .excluded_components
            .iter()
            .any(|excluded| term_in_text(&text, &normalize(excluded)));

        if by_component || by_description {
            tracing::warn!(
                description = %items[top_index].description,
                "highest-value item is an excluded component, vetoing claim coverage"
            );
            primary.is_covered = false;
            primary.reasoning = format!(
                "{}; vetoed: highest-value item '{}' is an excluded component",
                primary.reasoning, items[top_index].description
            );
        }
    }

    fn request_context(&self) -> RequestContext {
        RequestContext::new(
            self.settings.llm.model.clone(),
            self.settings.llm.temperature,
            self.settings.llm.max_tokens,
        )
    }

    fn item_summaries(items: &[LineItem], coverages: &[LineItemCoverage]) -> Vec<String> {
        items
            .iter()
            .zip(coverages.iter())
            .map(|(item, coverage)| {
                format!(
                    "{:?} (type: {:?}, price: {}, verdict: {:?})",
                    item.description, item.item_type, item.total_price, coverage.coverage_status
                )
            })
            .collect()
    }

    fn covered_component_lines(policy: &PolicyContext) -> Vec<String> {
        let mut lines: Vec<String> = policy
            .covered_categories
            .iter()
            .map(|category| {
                format!("{}: {}", category, policy.components_for(category).join(", "))
            })
            .collect();
        lines.sort();
        lines
    }

    /// Claim-scoped calls share the matcher's retry/backoff policy.
    async fn call_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        ctx: &RequestContext,
        mut call: F,
    ) -> Result<LlmResponse<T>, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<LlmResponse<T>, LlmError>>,
    {
        let timeout = Duration::from_secs(self.settings.llm.request_timeout_secs);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout),
            };

            match result {
                Ok(response) => {
                    self.audit.record(AuditEntry {
                        correlation_id: ctx.correlation_id,
                        model: ctx.model.clone(),
                        operation: operation.to_string(),
                        prompt: response.prompt.clone(),
                        response: response.raw_response.clone(),
                        prompt_tokens: response.prompt_tokens,
                        completion_tokens: response.completion_tokens,
                        sequence: self.counter.next(),
                        recorded_at: Utc::now(),
                    });
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.settings.llm.max_attempts => {
                    let delay = self.settings.llm.backoff_base_ms * 2u64.pow(attempt - 1);
                    tracing::warn!(operation, attempt, delay_ms = delay, error = %e, "retrying llm call");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(LlmError::Exhausted { attempts: attempt })
                }
                Err(e) => return Err(e),
            }
        }
    }
}
