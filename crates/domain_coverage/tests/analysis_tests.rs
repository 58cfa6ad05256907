//! End-to-end claim analysis scenarios

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::ClaimId;
use domain_coverage::{
    CoverageAnalyzer, CoverageStatus, DeterminationMethod, MemoryAuditSink,
};
use domain_policy::{CoverageTier, EngineSettings, LlmSettings};
use test_utils::{
    assert_conservation, assert_statuses, standard_vocabulary, LineItemBuilder,
    MockLanguageModel, PolicyContextBuilder,
};

fn settings() -> EngineSettings {
    EngineSettings {
        llm: LlmSettings {
            backoff_base_ms: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn analyzer(mock: Arc<MockLanguageModel>) -> (CoverageAnalyzer, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let analyzer =
        CoverageAnalyzer::new(standard_vocabulary(), settings(), mock, audit.clone()).unwrap();
    (analyzer, audit)
}

#[tokio::test]
async fn test_happy_path_oil_cooler_claim() {
    let mock = Arc::new(MockLanguageModel::new());
    let (analyzer, _) = analyzer(mock.clone());

    let items = vec![
        LineItemBuilder::parts("Ölkühlergehäuse", dec!(458.60)).build(),
        LineItemBuilder::labor("Ölkühler ersetzen", dec!(660.00)).build(),
    ];
    let policy = PolicyContextBuilder::new().with_vehicle(40_000, 4).build();

    let result = analyzer
        .analyze(ClaimId::new_v7(), &items, &policy)
        .await
        .unwrap();

    assert_statuses(
        &result.items,
        &[CoverageStatus::Covered, CoverageStatus::Covered],
    );
    assert_conservation(&result.items);

    assert_eq!(
        result.primary_repair.component.as_deref(),
        Some("oil_cooler")
    );
    assert!(result.primary_repair.is_covered);
    assert!(result.primary_repair.confidence >= 0.8);

    // The repair context came from the labor line.
    assert_eq!(
        result.repair_context.primary_component.as_deref(),
        Some("oil_cooler")
    );

    // Fully deterministic claim: the model was never called.
    assert_eq!(mock.classify_calls(), 0);
    assert_eq!(mock.primary_calls(), 0);

    // Below the first tier threshold the policy pays 100%:
    // 1118.60 + 8.1% VAT = 1209.21; deductible max(120.92, 150) = 150.
    let payout = &result.summary.payout;
    assert_eq!(payout.coverage_percent, dec!(100));
    assert_eq!(payout.covered_subtotal.amount(), dec!(1118.60));
    assert_eq!(payout.vat_inclusive.amount(), dec!(1209.21));
    assert_eq!(payout.deductible.amount(), dec!(150.00));
    assert_eq!(payout.payable.amount(), dec!(1059.21));

    assert_eq!(result.summary.covered_count, 2);
    assert_eq!(result.summary.total, dec!(1118.60));
}

#[tokio::test]
async fn test_unresolvable_items_surface_as_review_needed() {
    // No scripted responses: the model is effectively unconfigured.
    let mock = Arc::new(MockLanguageModel::new());
    let (analyzer, _) = analyzer(mock.clone());

    let items = vec![
        LineItemBuilder::parts("Völlig unbekanntes Teil XYZ", dec!(250.00)).build(),
        LineItemBuilder::fee("Umweltpauschale", dec!(12.00)).build(),
    ];
    let policy = PolicyContextBuilder::new().build();

    let result = analyzer
        .analyze(ClaimId::new_v7(), &items, &policy)
        .await
        .unwrap();

    assert_statuses(
        &result.items,
        &[CoverageStatus::ReviewNeeded, CoverageStatus::NotCovered],
    );
    // Uncertainty is surfaced, never silently resolved either way.
    assert_eq!(result.summary.review_count, 1);
    assert_eq!(result.summary.review_total, dec!(250.00));
    assert_eq!(result.summary.payout.payable.amount(), dec!(0));
    assert_eq!(
        result.primary_repair.determination_method,
        DeterminationMethod::None
    );
}

#[tokio::test]
async fn test_age_tier_override_applies_to_payout() {
    let mock = Arc::new(MockLanguageModel::new());
    let (analyzer, _) = analyzer(mock.clone());

    let items = vec![LineItemBuilder::parts("Ölkühlergehäuse", dec!(1000.00)).build()];
    let policy = PolicyContextBuilder::new()
        .with_coverage_scale(vec![CoverageTier {
            km_threshold: 50_000,
            coverage_percent: dec!(80),
            age_coverage_percent: Some(dec!(60)),
        }])
        .with_vehicle(75_000, 12)
        .build();

    let result = analyzer
        .analyze(ClaimId::new_v7(), &items, &policy)
        .await
        .unwrap();

    assert_eq!(result.summary.payout.coverage_percent, dec!(60));
    assert_eq!(result.summary.payout.gross_covered.amount(), dec!(600.00));
}

#[tokio::test]
async fn test_audit_entries_carry_distinct_correlation_ids() {
    let mock = Arc::new(MockLanguageModel::new());
    mock.push_classify(domain_coverage::ItemVerdict {
        status: domain_coverage::LlmLabel::NotCovered,
        component: None,
        category: None,
        confidence: 0.6,
        reasoning: "unrelated accessory".to_string(),
    });
    mock.push_classify(domain_coverage::ItemVerdict {
        status: domain_coverage::LlmLabel::NotCovered,
        component: None,
        category: None,
        confidence: 0.6,
        reasoning: "unrelated accessory".to_string(),
    });
    let (analyzer, audit) = analyzer(mock.clone());

    let items = vec![
        LineItemBuilder::parts("Unbekannt A", dec!(50.00)).build(),
        LineItemBuilder::parts("Unbekannt B", dec!(60.00)).build(),
    ];
    let policy = PolicyContextBuilder::new().build();

    analyzer
        .analyze(ClaimId::new_v7(), &items, &policy)
        .await
        .unwrap();

    let classify_entries: Vec<_> = audit
        .entries()
        .into_iter()
        .filter(|e| e.operation == "classify_item")
        .collect();
    assert_eq!(classify_entries.len(), 2);
    // Isolated request contexts: every worker has its own correlation id.
    assert_ne!(
        classify_entries[0].correlation_id,
        classify_entries[1].correlation_id
    );
    // The shared counter assigned distinct monotonic sequence numbers.
    assert_ne!(classify_entries[0].sequence, classify_entries[1].sequence);
}
