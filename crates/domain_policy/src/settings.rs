//! Engine tuning settings
//!
//! Confidence thresholds, concurrency limits, and payout heuristics are
//! configurable per tenant. Defaults match the values the matchers were
//! tuned against; override via configuration file or `ENGINE__*` environment
//! variables.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Acceptance thresholds for the matcher cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherThresholds {
    /// Minimum confidence for a keyword verdict to stand
    pub keyword_accept: f64,
    /// Minimum model confidence to accept an LLM COVERED verdict
    pub llm_covered_accept: f64,
    /// Minimum model confidence to accept an LLM NOT_COVERED verdict.
    /// Deliberately lower than the covered threshold: denials route to human
    /// review downstream, auto-approvals do not.
    pub llm_not_covered_accept: f64,
    /// LLM-reported confidence is clamped into [floor, cap]
    pub llm_confidence_floor: f64,
    pub llm_confidence_cap: f64,
    /// Multiplicative downgrade when a keyword hit also matches a
    /// gasket/seal indicator. Keeps the downgraded confidence inside the
    /// keyword band so the verdict still lands instead of falling through
    /// to the model.
    pub gasket_downgrade_factor: f64,
    /// When set, a catalog hit whose category the policy does not list is
    /// emitted as REVIEW_NEEDED at this confidence instead of NOT_COVERED,
    /// allowing downstream tiers to arbitrate. Unset keeps strict-list
    /// behavior.
    pub catalog_extension_confidence: Option<f64>,
}

impl Default for MatcherThresholds {
    fn default() -> Self {
        Self {
            keyword_accept: 0.70,
            llm_covered_accept: 0.60,
            llm_not_covered_accept: 0.40,
            llm_confidence_floor: 0.40,
            llm_confidence_cap: 0.85,
            gasket_downgrade_factor: 0.85,
            catalog_extension_confidence: None,
        }
    }
}

/// Outbound language-model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Model name passed to the chat endpoint
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Attempt cap for transient failures (timeout, rate limit, parse)
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub backoff_base_ms: u64,
    /// Concurrent item classifications per claim
    pub concurrency: usize,
    /// Per-call timeout; an elapsed call degrades that one item to review
    pub request_timeout_secs: u64,
    /// Chat-completions endpoint base URL
    pub api_base: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            max_attempts: 3,
            backoff_base_ms: 500,
            concurrency: 4,
            request_timeout_secs: 30,
            api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Payout calculation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutSettings {
    /// Legal-entity suffixes marking the policyholder as a company able to
    /// reclaim VAT. Matched as a whole trailing token of the normalized name.
    pub legal_entity_suffixes: Vec<String>,
}

impl Default for PayoutSettings {
    fn default() -> Self {
        Self {
            legal_entity_suffixes: ["ag", "gmbh", "sa", "sarl", "sàrl", "sagl"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Top-level engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub thresholds: MatcherThresholds,
    pub llm: LlmSettings,
    pub payout: PayoutSettings,
}

impl EngineSettings {
    /// Loads settings from the environment (`ENGINE__LLM__MODEL=...`),
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings: Self = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a file merged over defaults.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let settings: Self = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Sanity-checks threshold ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if t.llm_confidence_floor > t.llm_confidence_cap {
            return Err(ConfigError::Invalid(
                "llm confidence floor exceeds cap".to_string(),
            ));
        }
        if t.llm_not_covered_accept > t.llm_covered_accept {
            return Err(ConfigError::Invalid(
                "not-covered acceptance must not exceed covered acceptance".to_string(),
            ));
        }
        if self.llm.concurrency == 0 {
            return Err(ConfigError::Invalid("llm concurrency must be >= 1".to_string()));
        }
        Ok(())
    }
}
