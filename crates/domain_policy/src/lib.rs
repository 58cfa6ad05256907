//! Policy Domain
//!
//! This crate holds everything the coverage engine reads but never writes:
//! the per-claim [`PolicyContext`], the per-tenant [`ComponentVocabulary`],
//! and the [`EngineSettings`] tuning the matcher cascade.
//!
//! Vocabulary and settings are configuration data loaded at process start.
//! A missing or empty vocabulary is a fatal error - defaulting to an empty
//! dictionary would silently push every line item to human review.

pub mod error;
pub mod policy;
pub mod settings;
pub mod vocabulary;

pub use error::{ConfigError, PolicyError};
pub use policy::{CoverageTier, PolicyContext};
pub use settings::{EngineSettings, LlmSettings, MatcherThresholds, PayoutSettings};
pub use vocabulary::{
    CatalogEntry, ComponentVocabulary, ContextHint, PartCatalog, PatternRule, RepairHint,
    TermEntry,
};
