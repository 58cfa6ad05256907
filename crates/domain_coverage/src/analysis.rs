//! Claim analysis service
//!
//! Wires the pipeline together for one claim: repair context, matcher
//! cascade, claim-level resolution, payout. The returned
//! [`CoverageAnalysisResult`] is generated once and immutable; downstream
//! stages (assessment rules, audit logging) consume it as-is.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use core_kernel::ClaimId;
use domain_policy::{ComponentVocabulary, EngineSettings, PolicyContext};

use crate::audit::{AuditSink, CallCounter};
use crate::cascade::CoverageCascade;
use crate::error::CoverageError;
use crate::item::{CoverageStatus, LineItem, LineItemCoverage};
use crate::llm::LanguageModel;
use crate::payout::{PayoutCalculator, PayoutResult};
use crate::repair_context::{derive_repair_context, RepairContext};
use crate::resolver::{ClaimResolver, PrimaryRepairResult};

/// Totals and counts by verdict, plus the payout breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total: Decimal,
    pub covered_total: Decimal,
    pub not_covered_total: Decimal,
    pub review_total: Decimal,
    pub covered_count: usize,
    pub not_covered_count: usize,
    pub review_count: usize,
    pub payout: PayoutResult,
}

/// Aggregate result for one claim run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageAnalysisResult {
    pub claim_id: ClaimId,
    /// Per-item verdicts, in input order
    pub items: Vec<LineItemCoverage>,
    pub repair_context: RepairContext,
    pub primary_repair: PrimaryRepairResult,
    pub summary: CoverageSummary,
    pub analyzed_at: DateTime<Utc>,
}

/// One-stop analysis service for a tenant
///
/// Stateless across claims: each [`analyze`](CoverageAnalyzer::analyze) call
/// is an independent invocation over its items and policy context.
pub struct CoverageAnalyzer {
    vocabulary: ComponentVocabulary,
    settings: EngineSettings,
    cascade: CoverageCascade,
    resolver: ClaimResolver,
    payout: PayoutCalculator,
}

impl CoverageAnalyzer {
    /// Builds the analyzer from validated tenant configuration.
    ///
    /// # Errors
    ///
    /// Fails when the vocabulary or settings are invalid; the engine never
    /// starts with an empty vocabulary.
    pub fn new(
        vocabulary: ComponentVocabulary,
        settings: EngineSettings,
        model: Arc<dyn LanguageModel>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, CoverageError> {
        vocabulary.validate()?;
        settings.validate()?;

        let counter = Arc::new(CallCounter::new());
        let cascade = CoverageCascade::new(
            &vocabulary,
            &settings,
            Arc::clone(&model),
            Arc::clone(&audit),
            Arc::clone(&counter),
        )?;
        let resolver = ClaimResolver::new(model, audit, counter, settings.clone());
        let payout = PayoutCalculator::new(settings.payout.clone());

        Ok(Self {
            vocabulary,
            settings,
            cascade,
            resolver,
            payout,
        })
    }

    /// Analyzes one claim.
    pub async fn analyze(
        &self,
        claim_id: ClaimId,
        items: &[LineItem],
        policy: &PolicyContext,
    ) -> Result<CoverageAnalysisResult, CoverageError> {
        tracing::info!(claim_id = %claim_id, item_count = items.len(), "starting claim analysis");

        // Computed once per claim, before item-level resolution.
        let repair_context = derive_repair_context(items, policy, &self.vocabulary);

        let mut coverages = self
            .cascade
            .analyze_items(items, policy, &self.vocabulary, &repair_context, &self.settings)
            .await;

        let primary_repair = self
            .resolver
            .resolve(items, &mut coverages, &repair_context, policy, &self.vocabulary)
            .await;

        for coverage in coverages.iter_mut() {
            coverage.assert_conservation();
        }

        let payout = self.payout.compute(&coverages, policy)?;
        let summary = Self::summarize(&coverages, payout);

        tracing::info!(
            claim_id = %claim_id,
            covered = summary.covered_count,
            not_covered = summary.not_covered_count,
            review = summary.review_count,
            payable = %summary.payout.payable,
            "claim analysis complete"
        );

        Ok(CoverageAnalysisResult {
            claim_id,
            items: coverages,
            repair_context,
            primary_repair,
            summary,
            analyzed_at: Utc::now(),
        })
    }

    fn summarize(coverages: &[LineItemCoverage], payout: PayoutResult) -> CoverageSummary {
        let mut summary = CoverageSummary {
            total: Decimal::ZERO,
            covered_total: Decimal::ZERO,
            not_covered_total: Decimal::ZERO,
            review_total: Decimal::ZERO,
            covered_count: 0,
            not_covered_count: 0,
            review_count: 0,
            payout,
        };

        for coverage in coverages {
            summary.total += coverage.total_price;
            match coverage.coverage_status {
                CoverageStatus::Covered => {
                    summary.covered_total += coverage.covered_amount;
                    summary.covered_count += 1;
                }
                CoverageStatus::NotCovered => {
                    summary.not_covered_total += coverage.not_covered_amount;
                    summary.not_covered_count += 1;
                }
                CoverageStatus::ReviewNeeded => {
                    summary.review_total += coverage.total_price;
                    summary.review_count += 1;
                }
            }
        }

        summary
    }
}
