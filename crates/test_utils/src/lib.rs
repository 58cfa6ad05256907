//! Test Utilities
//!
//! Shared infrastructure for testing the coverage engine:
//! - Builders for line items and policy contexts with sensible defaults
//! - A bilingual fixture vocabulary
//! - A scripted mock language model with call counters
//! - Common assertions

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod mock_llm;

pub use assertions::{assert_conservation, assert_statuses};
pub use builders::{LineItemBuilder, PolicyContextBuilder};
pub use fixtures::standard_vocabulary;
pub use mock_llm::MockLanguageModel;
