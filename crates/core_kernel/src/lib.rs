//! Core Kernel - Foundational types and utilities for the coverage engine
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Text normalization for multilingual description matching
//! - Common identifiers and value objects

pub mod error;
pub mod identifiers;
pub mod money;
pub mod text;

pub use error::CoreError;
pub use identifiers::{ClaimId, CorrelationId, LineItemId, TenantId};
pub use money::{Currency, Money, MoneyError, Rate};
pub use text::{
    canonical_key, normalize, normalize_part_code, term_in_text, terms_equivalent, tokenize,
};
