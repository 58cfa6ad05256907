//! Scripted mock language model
//!
//! Responses are queued per operation and popped in call order; an empty
//! queue behaves like an unconfigured model, so deterministic tests fail
//! soft exactly like production does. Call counters let tests assert the
//! cascade short-circuit property.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use domain_coverage::{
    AssociationRequest, AssociationVerdict, ItemClassificationRequest, ItemVerdict, LanguageModel,
    LlmError, LlmResponse, PrimaryRepairRequest, PrimaryRepairVerdict, RequestContext,
};

#[derive(Default)]
struct Counters {
    classify: usize,
    primary: usize,
    association: usize,
}

/// Mock implementing the [`LanguageModel`] port
#[derive(Default)]
pub struct MockLanguageModel {
    classify_queue: Mutex<VecDeque<Result<ItemVerdict, LlmError>>>,
    primary_queue: Mutex<VecDeque<Result<PrimaryRepairVerdict, LlmError>>>,
    association_queue: Mutex<VecDeque<Result<AssociationVerdict, LlmError>>>,
    counters: Mutex<Counters>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_classify(&self, verdict: ItemVerdict) {
        self.classify_queue.lock().unwrap().push_back(Ok(verdict));
    }

    pub fn push_classify_error(&self, error: LlmError) {
        self.classify_queue.lock().unwrap().push_back(Err(error));
    }

    pub fn push_primary(&self, verdict: PrimaryRepairVerdict) {
        self.primary_queue.lock().unwrap().push_back(Ok(verdict));
    }

    pub fn push_primary_error(&self, error: LlmError) {
        self.primary_queue.lock().unwrap().push_back(Err(error));
    }

    pub fn push_association(&self, verdict: AssociationVerdict) {
        self.association_queue.lock().unwrap().push_back(Ok(verdict));
    }

    pub fn classify_calls(&self) -> usize {
        self.counters.lock().unwrap().classify
    }

    pub fn primary_calls(&self) -> usize {
        self.counters.lock().unwrap().primary
    }

    pub fn association_calls(&self) -> usize {
        self.counters.lock().unwrap().association
    }

    fn wrap<T>(value: T) -> LlmResponse<T> {
        LlmResponse {
            value,
            prompt: "scripted prompt".to_string(),
            raw_response: "scripted response".to_string(),
            prompt_tokens: 25,
            completion_tokens: 12,
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn classify_item(
        &self,
        _ctx: &RequestContext,
        _request: &ItemClassificationRequest,
    ) -> Result<LlmResponse<ItemVerdict>, LlmError> {
        self.counters.lock().unwrap().classify += 1;
        let next = self.classify_queue.lock().unwrap().pop_front();
        match next {
            Some(result) => result.map(Self::wrap),
            None => Err(LlmError::NotConfigured),
        }
    }

    async fn identify_primary_repair(
        &self,
        _ctx: &RequestContext,
        _request: &PrimaryRepairRequest,
    ) -> Result<LlmResponse<PrimaryRepairVerdict>, LlmError> {
        self.counters.lock().unwrap().primary += 1;
        let next = self.primary_queue.lock().unwrap().pop_front();
        match next {
            Some(result) => result.map(Self::wrap),
            None => Err(LlmError::NotConfigured),
        }
    }

    async fn validate_associations(
        &self,
        _ctx: &RequestContext,
        _request: &AssociationRequest,
    ) -> Result<LlmResponse<AssociationVerdict>, LlmError> {
        self.counters.lock().unwrap().association += 1;
        let next = self.association_queue.lock().unwrap().pop_front();
        match next {
            Some(result) => result.map(Self::wrap),
            None => Err(LlmError::NotConfigured),
        }
    }
}
