//! Claim-level resolver tests: primary-repair tiers, association rescue,
//! labor anchoring, and the excluded-component veto.

use std::sync::Arc;

use rust_decimal_macros::dec;

use domain_coverage::{
    AssociationVerdict, CallCounter, ClaimResolver, CoverageStatus, DeterminationMethod, LineItem,
    LineItemCoverage, MatchMethod, MemoryAuditSink, PrimaryRepairVerdict, RepairContext,
};
use domain_policy::{EngineSettings, LlmSettings, PolicyContext};
use test_utils::{
    assert_conservation, standard_vocabulary, LineItemBuilder, MockLanguageModel,
    PolicyContextBuilder,
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

fn resolver(mock: Arc<MockLanguageModel>) -> (ClaimResolver, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let resolver = ClaimResolver::new(mock, audit.clone(), Arc::new(CallCounter::new()), settings());
    (resolver, audit)
}

fn covered_part(item: &LineItem, component: &str) -> LineItemCoverage {
    LineItemCoverage::covered(item, MatchMethod::Keyword, 0.85, "engine", component, "matched")
}

fn covered_labor(item: &LineItem, component: &str) -> LineItemCoverage {
    LineItemCoverage::covered(item, MatchMethod::Keyword, 0.85, "engine", component, "matched")
}

fn llm_denied(item: &LineItem) -> LineItemCoverage {
    LineItemCoverage::not_covered(item, MatchMethod::Llm, 0.6, "no covered component matches")
}

fn rule_denied(item: &LineItem) -> LineItemCoverage {
    LineItemCoverage::not_covered(item, MatchMethod::Rule, 1.0, "matched exclusion rule 'disposal'")
}

fn policy() -> PolicyContext {
    PolicyContextBuilder::new().build()
}

#[tokio::test]
async fn test_primary_from_highest_value_covered_parts_item() {
    let mock = Arc::new(MockLanguageModel::new());
    let (resolver, _) = resolver(mock.clone());

    let items = vec![
        LineItemBuilder::parts("Ölkühlergehäuse", dec!(458.60)).build(),
        LineItemBuilder::labor("Ölkühler ersetzen", dec!(660.00)).build(),
        LineItemBuilder::parts("AGR-Ventil", dec!(120.00)).build(),
    ];
    let mut coverages = vec![
        covered_part(&items[0], "oil_cooler"),
        covered_labor(&items[1], "oil_cooler"),
        covered_part(&items[2], "egr_valve"),
    ];

    let primary = resolver
        .resolve(
            &items,
            &mut coverages,
            &RepairContext::default(),
            &policy(),
            &standard_vocabulary(),
        )
        .await;

    // Parts beat labor even though the labor line is more expensive.
    assert_eq!(primary.component.as_deref(), Some("oil_cooler"));
    assert_eq!(primary.determination_method, DeterminationMethod::CoveredItem);
    assert!(primary.is_covered);
    assert!(primary.confidence >= 0.8);
    assert_eq!(mock.primary_calls(), 0);
}

#[tokio::test]
async fn test_primary_from_repair_context_when_no_covered_item() {
    let mock = Arc::new(MockLanguageModel::new());
    let (resolver, _) = resolver(mock.clone());

    let items = vec![LineItemBuilder::parts("Unbekannt", dec!(300.00)).build()];
    let mut coverages = vec![llm_denied(&items[0])];

    let repair_context = RepairContext {
        primary_component: Some("oil_cooler".to_string()),
        primary_category: Some("engine".to_string()),
        is_covered: true,
        source_description: Some("Ölkühler ersetzen".to_string()),
    };

    let primary = resolver
        .resolve(&items, &mut coverages, &repair_context, &policy(), &standard_vocabulary())
        .await;

    assert_eq!(primary.determination_method, DeterminationMethod::RepairContext);
    assert_eq!(primary.component.as_deref(), Some("oil_cooler"));
    assert!(primary.is_covered);
    assert_eq!(mock.primary_calls(), 0);
}

#[tokio::test]
async fn test_primary_via_llm_validated_against_policy() {
    let mock = Arc::new(MockLanguageModel::new());
    mock.push_primary(PrimaryRepairVerdict {
        component: Some("water_pump".to_string()),
        category: Some("engine".to_string()),
        confidence: 0.9,
        reasoning: "most items relate to the cooling circuit".to_string(),
    });
    let (resolver, audit) = resolver(mock.clone());

    let items = vec![LineItemBuilder::parts("Unbekannt", dec!(300.00)).build()];
    let mut coverages = vec![
        LineItemCoverage::review_needed(&items[0], MatchMethod::Llm, 0.3, "unclear"),
    ];

    let primary = resolver
        .resolve(
            &items,
            &mut coverages,
            &RepairContext::default(),
            &policy(),
            &standard_vocabulary(),
        )
        .await;

    assert_eq!(primary.determination_method, DeterminationMethod::Llm);
    assert_eq!(primary.component.as_deref(), Some("water_pump"));
    assert!(primary.is_covered);
    // Model confidence is clamped to the cap.
    assert_eq!(primary.confidence, 0.85);
    assert_eq!(mock.primary_calls(), 1);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, "identify_primary_repair");
}

#[tokio::test]
async fn test_primary_none_when_every_tier_fails() {
    let mock = Arc::new(MockLanguageModel::new());
    let (resolver, _) = resolver(mock.clone());

    let items = vec![LineItemBuilder::parts("Unbekannt", dec!(300.00)).build()];
    let mut coverages = vec![llm_denied(&items[0])];

    let primary = resolver
        .resolve(
            &items,
            &mut coverages,
            &RepairContext::default(),
            &policy(),
            &standard_vocabulary(),
        )
        .await;

    assert_eq!(primary.determination_method, DeterminationMethod::None);
    assert_eq!(primary.confidence, 0.0);
    assert!(!primary.is_covered);
}

#[tokio::test]
async fn test_association_rescue_promotes_denied_part() {
    let mock = Arc::new(MockLanguageModel::new());
    mock.push_association(AssociationVerdict {
        rescued_indices: vec![1],
        reasoning: "same housing under vendor catalog name".to_string(),
    });
    let (resolver, _) = resolver(mock.clone());

    let items = vec![
        LineItemBuilder::labor("Ölkühler ersetzen", dec!(660.00)).build(),
        LineItemBuilder::parts("Anbausatz 77.11.530", dec!(458.60)).build(),
        LineItemBuilder::parts("Entsorgung", dec!(15.00)).build(),
    ];
    let mut coverages = vec![
        covered_labor(&items[0], "oil_cooler"),
        llm_denied(&items[1]),
        rule_denied(&items[2]),
    ];

    let primary = resolver
        .resolve(
            &items,
            &mut coverages,
            &RepairContext::default(),
            &policy(),
            &standard_vocabulary(),
        )
        .await;

    assert_eq!(mock.association_calls(), 1);
    // The denied part is now covered, with its original verdict recorded.
    assert_eq!(coverages[1].coverage_status, CoverageStatus::Covered);
    assert_eq!(coverages[1].original_status, Some(CoverageStatus::NotCovered));
    assert_eq!(coverages[1].matched_component.as_deref(), Some("oil_cooler"));
    // Rule-denied items are never reconsidered.
    assert_eq!(coverages[2].coverage_status, CoverageStatus::NotCovered);
    assert!(coverages[2].original_status.is_none());
    // The rescued part anchors the labor.
    assert_eq!(coverages[0].coverage_status, CoverageStatus::Covered);
    assert!(primary.is_covered);
    assert_conservation(&coverages);
}

#[tokio::test]
async fn test_labor_demoted_without_anchoring_part() {
    let mock = Arc::new(MockLanguageModel::new());
    let (resolver, _) = resolver(mock.clone());

    let items = vec![
        LineItemBuilder::labor("Ölkühler ersetzen", dec!(660.00)).build(),
        LineItemBuilder::parts("Unbekannt", dec!(100.00)).build(),
    ];
    let mut coverages = vec![covered_labor(&items[0], "oil_cooler"), llm_denied(&items[1])];

    let primary = resolver
        .resolve(
            &items,
            &mut coverages,
            &RepairContext::default(),
            &policy(),
            &standard_vocabulary(),
        )
        .await;

    assert_eq!(coverages[0].coverage_status, CoverageStatus::NotCovered);
    assert_eq!(coverages[0].original_status, Some(CoverageStatus::Covered));
    // The primary was anchored on the demoted labor line.
    assert!(!primary.is_covered);
    assert_conservation(&coverages);
}

#[tokio::test]
async fn test_demoted_labor_promoted_back_when_anchor_appears() {
    let mock = Arc::new(MockLanguageModel::new());
    let (resolver, _) = resolver(mock.clone());

    let items = vec![
        LineItemBuilder::labor("Ölkühler ersetzen", dec!(660.00)).build(),
        LineItemBuilder::parts("Ölkühlergehäuse", dec!(458.60)).build(),
    ];
    let mut demoted_labor = covered_labor(&items[0], "oil_cooler");
    demoted_labor.demote_to_not_covered("no covered part anchors this labor");
    let mut coverages = vec![demoted_labor, covered_part(&items[1], "oil_cooler")];

    resolver
        .resolve(
            &items,
            &mut coverages,
            &RepairContext::default(),
            &policy(),
            &standard_vocabulary(),
        )
        .await;

    assert_eq!(coverages[0].coverage_status, CoverageStatus::Covered);
    assert_conservation(&coverages);
}

#[tokio::test]
async fn test_excluded_component_veto() {
    let mock = Arc::new(MockLanguageModel::new());
    let (resolver, _) = resolver(mock.clone());

    let policy = PolicyContextBuilder::new()
        .with_excluded_component("turbocharger")
        .build();

    let items = vec![
        LineItemBuilder::parts("Turbolader", dec!(2800.00)).build(),
        LineItemBuilder::parts("Ölkühlergehäuse", dec!(458.60)).build(),
    ];
    let turbo = LineItemCoverage::not_covered(
        &items[0],
        MatchMethod::Keyword,
        0.85,
        "matched dictionary term 'turbolader', component not in covered list",
    )
    .with_match("engine", "turbocharger");
    let mut coverages = vec![turbo, covered_part(&items[1], "oil_cooler")];

    let primary = resolver
        .resolve(
            &items,
            &mut coverages,
            &RepairContext::default(),
            &policy,
            &standard_vocabulary(),
        )
        .await;

    // The small covered part alone would have passed; the veto flips it.
    assert!(!primary.is_covered);
    assert!(primary.reasoning.contains("vetoed"));
}
