//! Coverage Resolution Engine
//!
//! Determines, for each line item on a vehicle-repair cost estimate, whether
//! it is financially covered by the warranty policy, and aggregates the
//! per-item verdicts into a claim-level payout.
//!
//! # Pipeline
//!
//! ```text
//! LineItems ──▶ Rule Engine ──▶ Part Lookup ──▶ Keyword Matcher ──▶ LLM Fallback
//!                 (cascade, first verdict wins per item)
//!           ──▶ Claim-Level Resolver (primary repair, labor anchoring, veto)
//!           ──▶ Payout Calculator (tiers, VAT, deductible, caps)
//! ```
//!
//! Every item receives exactly one terminal verdict; uncertainty surfaces as
//! `REVIEW_NEEDED`, never as a silent approval or denial.

pub mod analysis;
pub mod audit;
pub mod cascade;
pub mod error;
pub mod item;
pub mod llm;
pub mod matchers;
pub mod payout;
pub mod repair_context;
pub mod resolver;

pub use analysis::{CoverageAnalysisResult, CoverageAnalyzer, CoverageSummary};
pub use audit::{AuditEntry, AuditSink, CallCounter, MemoryAuditSink, TracingAuditSink};
pub use cascade::CoverageCascade;
pub use error::CoverageError;
pub use item::{CoverageStatus, ItemType, LineItem, LineItemCoverage, MatchMethod};
pub use llm::{
    AssociationRequest, AssociationVerdict, DeniedPart, DisabledLanguageModel,
    ItemClassificationRequest, ItemVerdict, LanguageModel, LlmError, LlmLabel, LlmResponse,
    OpenAiChat, PrimaryRepairRequest, PrimaryRepairVerdict, RequestContext,
};
pub use payout::{PayoutCalculator, PayoutResult};
pub use repair_context::{derive_repair_context, RepairContext};
pub use resolver::{ClaimResolver, DeterminationMethod, PrimaryRepairResult};
