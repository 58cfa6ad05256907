//! Port trait for the external language model

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::CorrelationId;

use crate::item::ItemType;

/// Errors from the language-model transport
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Language model not configured")]
    NotConfigured,

    #[error("Retries exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl LlmError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout
                | LlmError::RateLimited
                | LlmError::Transport(_)
                | LlmError::MalformedResponse(_)
        )
    }
}

/// Per-task request context for outbound calls.
///
/// Each concurrent worker holds its own copy; sharing one mutable context
/// across workers corrupts audit attribution.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RequestContext {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            correlation_id: CorrelationId::new_v7(),
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

/// A typed model response together with the audit payload
#[derive(Debug, Clone)]
pub struct LlmResponse<T> {
    pub value: T,
    pub prompt: String,
    pub raw_response: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Coverage label as reported by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LlmLabel {
    Covered,
    NotCovered,
    ReviewNeeded,
}

/// Request to classify a single unresolved line item
#[derive(Debug, Clone, Serialize)]
pub struct ItemClassificationRequest {
    pub description: String,
    pub item_type: ItemType,
    pub total_price: Decimal,
    /// "category: component, component, ..." lines from the policy
    pub covered_components: Vec<String>,
    /// Descriptions and components of items already resolved as covered,
    /// giving the model repair context
    pub resolved_covered_items: Vec<String>,
}

/// Model verdict for a single item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemVerdict {
    pub status: LlmLabel,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
}

/// Request to name the primary repaired component across a claim
#[derive(Debug, Clone, Serialize)]
pub struct PrimaryRepairRequest {
    /// One summary line per estimate item: description, type, price, verdict
    pub item_summaries: Vec<String>,
    pub covered_components: Vec<String>,
}

/// Model verdict for the claim's primary repair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryRepairVerdict {
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
}

/// A denied part offered for repair-association re-evaluation
#[derive(Debug, Clone, Serialize)]
pub struct DeniedPart {
    pub index: usize,
    pub description: String,
    pub total_price: Decimal,
}

/// Request to re-evaluate denied parts against the identified primary repair
#[derive(Debug, Clone, Serialize)]
pub struct AssociationRequest {
    pub primary_component: String,
    pub primary_category: String,
    pub item_summaries: Vec<String>,
    pub denied_parts: Vec<DeniedPart>,
}

/// Indices of denied parts that are plausibly the primary component under a
/// different catalog name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationVerdict {
    #[serde(default)]
    pub rescued_indices: Vec<usize>,
    pub reasoning: String,
}

/// Port for the external language model.
///
/// Implementations must return structured verdicts along with the exact
/// prompt/response text and token counts for audit emission; the engine
/// records every invocation synchronously.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn classify_item(
        &self,
        ctx: &RequestContext,
        request: &ItemClassificationRequest,
    ) -> Result<LlmResponse<ItemVerdict>, LlmError>;

    async fn identify_primary_repair(
        &self,
        ctx: &RequestContext,
        request: &PrimaryRepairRequest,
    ) -> Result<LlmResponse<PrimaryRepairVerdict>, LlmError>;

    async fn validate_associations(
        &self,
        ctx: &RequestContext,
        request: &AssociationRequest,
    ) -> Result<LlmResponse<AssociationVerdict>, LlmError>;
}
