//! Chat-completions adapter for the language-model port

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::port::{
    AssociationRequest, AssociationVerdict, ItemClassificationRequest, ItemVerdict, LanguageModel,
    LlmError, LlmResponse, PrimaryRepairRequest, PrimaryRepairVerdict, RequestContext,
};

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Language model backed by an OpenAI-compatible chat endpoint
pub struct OpenAiChat {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiChat {
    /// Creates an adapter with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            api_key: api_key.into(),
        })
    }

    async fn chat_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        system: &str,
        user: String,
    ) -> Result<LlmResponse<T>, LlmError> {
        let body = json!({
            "model": ctx.model,
            "temperature": ctx.temperature,
            "max_tokens": ctx.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            return Err(LlmError::Transport(format!("unexpected status {status}")));
        }

        let envelope: ChatEnvelope = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let content = envelope
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::MalformedResponse("no choices in response".to_string()))?;

        let value: T = serde_json::from_str(&content)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(LlmResponse {
            value,
            prompt: user,
            raw_response: content,
            prompt_tokens: envelope.usage.prompt_tokens,
            completion_tokens: envelope.usage.completion_tokens,
        })
    }
}

const CLASSIFY_SYSTEM: &str = "You classify vehicle-repair estimate line items against a \
warranty policy. Respond with a JSON object: {\"status\": \"COVERED\" | \"NOT_COVERED\" | \
\"REVIEW_NEEDED\", \"component\": string or null, \"category\": string or null, \
\"confidence\": number in [0,1], \"reasoning\": string}. Descriptions may be German or \
French vendor nomenclature. Only use components from the covered list.";

const PRIMARY_SYSTEM: &str = "You identify the single primary repaired component of a \
vehicle-repair estimate. Respond with a JSON object: {\"component\": string or null, \
\"category\": string or null, \"confidence\": number in [0,1], \"reasoning\": string}.";

const ASSOCIATION_SYSTEM: &str = "You re-evaluate denied estimate parts against the \
identified primary repair. A part qualifies only when it is plausibly the same component \
under a different catalog name. Respond with a JSON object: {\"rescued_indices\": \
[numbers], \"reasoning\": string}.";

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn classify_item(
        &self,
        ctx: &RequestContext,
        request: &ItemClassificationRequest,
    ) -> Result<LlmResponse<ItemVerdict>, LlmError> {
        let user = format!(
            "Line item: {desc:?} (type: {ty:?}, price: {price})\n\
             Covered components by category:\n{covered}\n\
             Items already resolved as covered:\n{resolved}",
            desc = request.description,
            ty = request.item_type,
            price = request.total_price,
            covered = request.covered_components.join("\n"),
            resolved = if request.resolved_covered_items.is_empty() {
                "(none)".to_string()
            } else {
                request.resolved_covered_items.join("\n")
            },
        );
        self.chat_json(ctx, CLASSIFY_SYSTEM, user).await
    }

    async fn identify_primary_repair(
        &self,
        ctx: &RequestContext,
        request: &PrimaryRepairRequest,
    ) -> Result<LlmResponse<PrimaryRepairVerdict>, LlmError> {
        let user = format!(
            "Estimate items:\n{items}\n\
             Covered components by category:\n{covered}",
            items = request.item_summaries.join("\n"),
            covered = request.covered_components.join("\n"),
        );
        self.chat_json(ctx, PRIMARY_SYSTEM, user).await
    }

    async fn validate_associations(
        &self,
        ctx: &RequestContext,
        request: &AssociationRequest,
    ) -> Result<LlmResponse<AssociationVerdict>, LlmError> {
        let denied: Vec<String> = request
            .denied_parts
            .iter()
            .map(|p| format!("[{}] {:?} (price: {})", p.index, p.description, p.total_price))
            .collect();
        let user = format!(
            "Primary repair: {component} (category: {category})\n\
             Full estimate:\n{items}\n\
             Denied parts to re-evaluate:\n{denied}",
            component = request.primary_component,
            category = request.primary_category,
            items = request.item_summaries.join("\n"),
            denied = denied.join("\n"),
        );
        self.chat_json(ctx, ASSOCIATION_SYSTEM, user).await
    }
}

/// Offline stand-in used when no API key is configured.
///
/// Every call fails with [`LlmError::NotConfigured`]; the cascade degrades
/// unresolved items to REVIEW_NEEDED instead of guessing.
pub struct DisabledLanguageModel;

#[async_trait]
impl LanguageModel for DisabledLanguageModel {
    async fn classify_item(
        &self,
        _ctx: &RequestContext,
        _request: &ItemClassificationRequest,
    ) -> Result<LlmResponse<ItemVerdict>, LlmError> {
        Err(LlmError::NotConfigured)
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
