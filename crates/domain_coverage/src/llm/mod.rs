//! Language-model port and adapters
//!
//! The engine talks to the model through the [`LanguageModel`] port trait;
//! the reqwest-backed chat adapter and the offline stand-in both implement
//! it. Tests script a mock against the same trait.

mod openai;
mod port;

pub use openai::{DisabledLanguageModel, OpenAiChat};
pub use port::{
    AssociationRequest, AssociationVerdict, DeniedPart, ItemClassificationRequest, ItemVerdict,
    LanguageModel, LlmError, LlmLabel, LlmResponse, PrimaryRepairRequest, PrimaryRepairVerdict,
    RequestContext,
};
