//! Cascade orchestrator
//!
//! Evaluates the stages in fixed order per item - rule engine, part-number
//! lookup, keyword matcher, LLM fallback - short-circuiting on the first
//! stage that returns a verdict. Deterministic free stages must never be
//! bypassed for items they can resolve; a stage with only a partial hunch
//! returns `None` rather than consuming the item.
//!
//! The LLM stage is the only source of latency and runs with bounded
//! concurrency across the unresolved items of the claim. Output ordering is
//! restored by input index; each worker holds its own request context.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use domain_policy::{ComponentVocabulary, EngineSettings, PolicyContext};

use crate::audit::{AuditSink, CallCounter};
use crate::error::CoverageError;
use crate::item::{LineItem, LineItemCoverage, MatchMethod};
use crate::llm::{LanguageModel, RequestContext};
use crate::matchers::{
    ClaimPromptContext, KeywordMatcher, LlmMatcher, MatchContext, MatchStage, PartNumberLookup,
    RuleEngine,
};
use crate::repair_context::RepairContext;

/// Sequences the four matching strategies per line item
pub struct CoverageCascade {
    stages: Vec<Box<dyn MatchStage>>,
    llm: LlmMatcher,
    concurrency: usize,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl CoverageCascade {
    /// Builds the standard cascade from tenant configuration.
    pub fn new(
        vocabulary: &ComponentVocabulary,
        settings: &EngineSettings,
        model: Arc<dyn LanguageModel>,
        audit: Arc<dyn AuditSink>,
        counter: Arc<CallCounter>,
    ) -> Result<Self, CoverageError> {
        let stages: Vec<Box<dyn MatchStage>> = vec![
            Box::new(RuleEngine::from_vocabulary(vocabulary)?),
            Box::new(PartNumberLookup),
            Box::new(KeywordMatcher::from_vocabulary(vocabulary)),
        ];
        Ok(Self::with_stages(stages, settings, model, audit, counter))
    }

    /// Builds a cascade with custom deterministic stages. The LLM fallback
    /// always runs last.
    pub fn with_stages(
        stages: Vec<Box<dyn MatchStage>>,
        settings: &EngineSettings,
        model: Arc<dyn LanguageModel>,
        audit: Arc<dyn AuditSink>,
        counter: Arc<CallCounter>,
    ) -> Self {
        let llm = LlmMatcher::new(
            model,
            audit,
            counter,
            settings.thresholds.clone(),
            settings.llm.clone(),
        );
        Self {
            stages,
            llm,
            concurrency: settings.llm.concurrency,
            model_name: settings.llm.model.clone(),
            temperature: settings.llm.temperature,
            max_tokens: settings.llm.max_tokens,
        }
    }

    /// Produces exactly one verdict per input item, in input order.
    pub async fn analyze_items(
        &self,
        items: &[LineItem],
        policy: &PolicyContext,
        vocabulary: &ComponentVocabulary,
        repair_context: &RepairContext,
        settings: &EngineSettings,
    ) -> Vec<LineItemCoverage> {
        let ctx = MatchContext {
            policy,
            vocabulary,
            thresholds: &settings.thresholds,
            repair_context,
            claim_items: items,
        };

        let mut results: Vec<Option<LineItemCoverage>> = Vec::with_capacity(items.len());
        let mut unresolved: Vec<usize> = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let verdict = self.stages.iter().find_map(|stage| {
                stage
                    .evaluate(item, &ctx)
                    .map(|verdict| (stage.name(), verdict))
            });
            match verdict {
                Some((stage, verdict)) => {
                    tracing::debug!(
                        index,
                        stage,
                        status = ?verdict.coverage_status,
                        "item resolved deterministically"
                    );
                    results.push(Some(verdict));
                }
                None => {
                    results.push(None);
                    unresolved.push(index);
                }
            }
        }

        if !unresolved.is_empty() {
            tracing::info!(
                unresolved = unresolved.len(),
                total = items.len(),
                "escalating to llm fallback"
            );
            self.run_llm_stage(items, &mut results, &unresolved, policy, vocabulary)
                .await;
        }

        // Every item receives exactly one terminal verdict, even if a worker
        // died.
        results
            .into_iter()
            .enumerate()
            .map(|(index, verdict)| {
                verdict.unwrap_or_else(|| {
                    LineItemCoverage::review_needed(
                        &items[index],
                        MatchMethod::Llm,
                        0.0,
                        "classification worker failed",
                    )
                })
            })
            .collect()
    }

    async fn run_llm_stage(
        &self,
        items: &[LineItem],
        results: &mut [Option<LineItemCoverage>],
        unresolved: &[usize],
        policy: &PolicyContext,
        vocabulary: &ComponentVocabulary,
    ) {
        // Built from the deterministic results so the model sees what is
        // already covered.
        let claim = Arc::new(ClaimPromptContext::build(policy, vocabulary, results, items));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(usize, LineItemCoverage)> = JoinSet::new();

        for &index in unresolved {
            let item = items[index].clone();
            let matcher = self.llm.clone();
            let claim = Arc::clone(&claim);
            let semaphore = Arc::clone(&semaphore);
            // Fresh context per task: isolated correlation id for audit
            // attribution.
            let request_ctx =
                RequestContext::new(self.model_name.clone(), self.temperature, self.max_tokens);

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            LineItemCoverage::review_needed(
                                &item,
                                MatchMethod::Llm,
                                0.0,
                                "classification pool closed",
                            ),
                        );
                    }
                };
                let verdict = matcher.match_item(&item, &claim, &request_ctx).await;
                (index, verdict)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, verdict)) => results[index] = Some(verdict),
                Err(e) => {
                    // The worker carried its index with it; the affected slot
                    // stays None and is filled with a review verdict above.
                    tracing::error!(error = %e, "llm classification task failed");
                }
            }
        }
    }
}
