//! LLM fallback matcher
//!
//! Last resort for items no deterministic stage resolves. One call per
//! unresolved item, carrying the claim's covered-components list and the
//! items already resolved as covered for repair context.
//!
//! Acceptance is asymmetric: auto-approving requires more model confidence
//! than auto-denying, because denials route to human review downstream while
//! approvals pay out. Anything below the applicable threshold, and every
//! transport or parse failure, degrades to REVIEW_NEEDED - never an error to
//! the caller.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use domain_policy::{ComponentVocabulary, LlmSettings, MatcherThresholds, PolicyContext};

use crate::audit::{AuditEntry, AuditSink, CallCounter};
use crate::item::{LineItem, LineItemCoverage, MatchMethod};
use crate::llm::{
    ItemClassificationRequest, ItemVerdict, LanguageModel, LlmError, LlmLabel, RequestContext,
};

/// Claim-wide prompt context, built once per claim and shared read-only
/// across the concurrent item classifications.
#[derive(Debug, Clone, Default)]
pub struct ClaimPromptContext {
    /// "category: component, component" lines
    pub covered_components: Vec<String>,
    /// "description -> component" lines for items already covered
    pub resolved_covered_items: Vec<String>,
}

impl ClaimPromptContext {
    pub fn build(
        policy: &PolicyContext,
        _vocabulary: &ComponentVocabulary,
        resolved: &[Option<LineItemCoverage>],
        items: &[LineItem],
    ) -> Self {
        let mut covered_components: Vec<String> = policy
            .covered_categories
            .iter()
            .map(|category| {
                format!("{}: {}", category, policy.components_for(category).join(", "))
            })
            .collect();
        covered_components.sort();

        let resolved_covered_items = resolved
            .iter()
            .zip(items.iter())
            .filter_map(|(verdict, item)| {
                let verdict = verdict.as_ref()?;
                let component = verdict.matched_component.as_deref()?;
                (verdict.coverage_status == crate::item::CoverageStatus::Covered)
                    .then(|| format!("{} -> {}", item.description, component))
            })
            .collect();

        Self {
            covered_components,
            resolved_covered_items,
        }
    }
}

/// Stage 4: model-backed classification for unresolved items
#[derive(Clone)]
pub struct LlmMatcher {
    model: Arc<dyn LanguageModel>,
    audit: Arc<dyn AuditSink>,
    counter: Arc<CallCounter>,
    thresholds: MatcherThresholds,
    settings: LlmSettings,
}

impl LlmMatcher {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        audit: Arc<dyn AuditSink>,
        counter: Arc<CallCounter>,
        thresholds: MatcherThresholds,
        settings: LlmSettings,
    ) -> Self {
        Self {
            model,
            audit,
            counter,
            thresholds,
            settings,
        }
    }

    /// Classifies one unresolved item. Infallible by contract: failures
    /// degrade the item to REVIEW_NEEDED.
    pub async fn match_item(
        &self,
        item: &LineItem,
        claim: &ClaimPromptContext,
        ctx: &RequestContext,
    ) -> LineItemCoverage {
        let request = ItemClassificationRequest {
            description: item.description.clone(),
            item_type: item.item_type,
            total_price: item.total_price,
            covered_components: claim.covered_components.clone(),
            resolved_covered_items: claim.resolved_covered_items.clone(),
        };

        match self.classify_with_retry(ctx, &request).await {
            Ok(verdict) => self.apply_thresholds(item, verdict),
            Err(e) => {
                tracing::warn!(
                    description = %item.description,
                    correlation_id = %ctx.correlation_id,
                    error = %e,
                    "llm classification failed, degrading to review"
                );
                LineItemCoverage::review_needed(
                    item,
                    MatchMethod::Llm,
                    0.0,
                    format!("language model unavailable: {e}"),
                )
            }
        }
    }

    async fn classify_with_retry(
        &self,
        ctx: &RequestContext,
        request: &ItemClassificationRequest,
    ) -> Result<ItemVerdict, LlmError> {
        let timeout = Duration::from_secs(self.settings.request_timeout_secs);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let call = self.model.classify_item(ctx, request);
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout),
            };

            match result {
                Ok(response) => {
                    self.audit.record(AuditEntry {
                        correlation_id: ctx.correlation_id,
                        model: ctx.model.clone(),
                        operation: "classify_item".to_string(),
                        prompt: response.prompt,
                        response: response.raw_response,
                        prompt_tokens: response.prompt_tokens,
                        completion_tokens: response.completion_tokens,
                        sequence: self.counter.next(),
                        recorded_at: Utc::now(),
                    });
                    return Ok(response.value);
                }
                Err(e) if e.is_retryable() && attempt < self.settings.max_attempts => {
                    let delay = self.settings.backoff_base_ms * 2u64.pow(attempt - 1);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "retrying llm classification"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(LlmError::Exhausted { attempts: attempt });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Clamps model confidence and applies the asymmetric thresholds.
    fn apply_thresholds(&self, item: &LineItem, verdict: ItemVerdict) -> LineItemCoverage {
        let t = &self.thresholds;
        let confidence = verdict
            .confidence
            .clamp(t.llm_confidence_floor, t.llm_confidence_cap);

        match verdict.status {
            LlmLabel::Covered if confidence >= t.llm_covered_accept => {
                match (verdict.category.as_deref(), verdict.component.as_deref()) {
                    (Some(category), Some(component)) => LineItemCoverage::covered(
                        item,
                        MatchMethod::Llm,
                        confidence,
                        category,
                        component,
                        verdict.reasoning,
                    ),
                    // An approval with no named component cannot anchor labor
                    // or survive audit; route to review.
                    _ => LineItemCoverage::review_needed(
                        item,
                        MatchMethod::Llm,
                        confidence,
                        format!("covered verdict without component: {}", verdict.reasoning),
                    ),
                }
            }
            LlmLabel::NotCovered if confidence >= t.llm_not_covered_accept => {
                let mut coverage = LineItemCoverage::not_covered(
                    item,
                    MatchMethod::Llm,
                    confidence,
                    verdict.reasoning,
                );
                if let (Some(category), Some(component)) = (verdict.category, verdict.component) {
                    coverage = coverage.with_match(category, component);
                }
                coverage
            }
            LlmLabel::ReviewNeeded => LineItemCoverage::review_needed(
                item,
                MatchMethod::Llm,
                confidence,
                verdict.reasoning,
            ),
            _ => LineItemCoverage::review_needed(
                item,
                MatchMethod::Llm,
                confidence,
                format!(
                    "confidence below acceptance threshold: {}",
                    verdict.reasoning
                ),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::item::{CoverageStatus, ItemType};
    use crate::llm::{
        AssociationRequest, AssociationVerdict, LlmResponse, PrimaryRepairRequest,
        PrimaryRepairVerdict,
    };
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Scripted model: pops one result per classify call.
    struct ScriptedModel {
        responses: Mutex<Vec<Result<ItemVerdict, LlmError>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<ItemVerdict, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn classify_item(
            &self,
            _ctx: &RequestContext,
            _request: &ItemClassificationRequest,
        ) -> Result<LlmResponse<ItemVerdict>, LlmError> {
            let next = self.responses.lock().unwrap().remove(0);
            next.map(|value| LlmResponse {
                value,
                prompt: "prompt".to_string(),
                raw_response: "{}".to_string(),
                prompt_tokens: 10,
                completion_tokens: 5,
            })
        }

        async fn identify_primary_repair(
            &self,
            _ctx: &RequestContext,
            _request: &PrimaryRepairRequest,
        ) -> Result<LlmResponse<PrimaryRepairVerdict>, LlmError> {
            Err(LlmError::NotConfigured)
        }

        async fn validate_associations(
            &self,
            _ctx: &RequestContext,
            _request: &AssociationRequest,
        ) -> Result<LlmResponse<AssociationVerdict>, LlmError> {
            Err(LlmError::NotConfigured)
        }
    }

    fn matcher(model: ScriptedModel) -> (LlmMatcher, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let mut settings = LlmSettings::default();
        settings.backoff_base_ms = 1;
        let matcher = LlmMatcher::new(
            Arc::new(model),
            audit.clone(),
            Arc::new(CallCounter::new()),
            MatcherThresholds::default(),
            settings,
        );
        (matcher, audit)
    }

    fn item() -> LineItem {
        LineItem::new("Unbekanntes Teil", ItemType::Parts, dec!(99.00), None)
    }

    fn ctx() -> RequestContext {
        RequestContext::new("gpt-4o-mini", 0.0, 1024)
    }

    fn verdict(status: LlmLabel, confidence: f64) -> ItemVerdict {
        ItemVerdict {
            status,
            component: Some("oil_cooler".to_string()),
            category: Some("engine".to_string()),
            confidence,
            reasoning: "model reasoning".to_string(),
        }
    }

    #[tokio::test]
    async fn test_confident_covered_verdict_accepted() {
        let (matcher, audit) =
            matcher(ScriptedModel::new(vec![Ok(verdict(LlmLabel::Covered, 0.8))]));
        let coverage = matcher.match_item(&item(), &ClaimPromptContext::default(), &ctx()).await;
        assert_eq!(coverage.coverage_status, CoverageStatus::Covered);
        assert_eq!(coverage.match_confidence, 0.8);
        assert_eq!(audit.entries().len(), 1);
        assert_eq!(audit.entries()[0].operation, "classify_item");
    }

    #[tokio::test]
    async fn test_low_confidence_covered_degrades_to_review() {
        let (matcher, _) =
            matcher(ScriptedModel::new(vec![Ok(verdict(LlmLabel::Covered, 0.5))]));
        let coverage = matcher.match_item(&item(), &ClaimPromptContext::default(), &ctx()).await;
        assert_eq!(coverage.coverage_status, CoverageStatus::ReviewNeeded);
    }

    #[tokio::test]
    async fn test_not_covered_accepted_at_lower_confidence() {
        // 0.5 is below the covered threshold but above the not-covered one.
        let (matcher, _) =
            matcher(ScriptedModel::new(vec![Ok(verdict(LlmLabel::NotCovered, 0.5))]));
        let coverage = matcher.match_item(&item(), &ClaimPromptContext::default(), &ctx()).await;
        assert_eq!(coverage.coverage_status, CoverageStatus::NotCovered);
    }

    #[tokio::test]
    async fn test_confidence_clamped_to_cap() {
        let (matcher, _) =
            matcher(ScriptedModel::new(vec![Ok(verdict(LlmLabel::Covered, 0.99))]));
        let coverage = matcher.match_item(&item(), &ClaimPromptContext::default(), &ctx()).await;
        assert_eq!(coverage.match_confidence, 0.85);
    }

    #[tokio::test]
    async fn test_transient_error_retried_then_succeeds() {
        let (matcher, audit) = matcher(ScriptedModel::new(vec![
            Err(LlmError::RateLimited),
            Ok(verdict(LlmLabel::Covered, 0.8)),
        ]));
        let coverage = matcher.match_item(&item(), &ClaimPromptContext::default(), &ctx()).await;
        assert_eq!(coverage.coverage_status, CoverageStatus::Covered);
        assert_eq!(audit.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_review() {
        let (matcher, _) = matcher(ScriptedModel::new(vec![
            Err(LlmError::Timeout),
            Err(LlmError::Timeout),
            Err(LlmError::Timeout),
        ]));
        let coverage = matcher.match_item(&item(), &ClaimPromptContext::default(), &ctx()).await;
        assert_eq!(coverage.coverage_status, CoverageStatus::ReviewNeeded);
        assert!(coverage.match_reasoning.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_not_configured_fails_soft_without_retry() {
        let (matcher, audit) =
            matcher(ScriptedModel::new(vec![Err(LlmError::NotConfigured)]));
        let coverage = matcher.match_item(&item(), &ClaimPromptContext::default(), &ctx()).await;
        assert_eq!(coverage.coverage_status, CoverageStatus::ReviewNeeded);
        assert!(audit.entries().is_empty());
    }
}
