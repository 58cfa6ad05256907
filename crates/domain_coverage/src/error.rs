//! Engine error types

use thiserror::Error;

use crate::llm::LlmError;

/// Errors raised by the coverage engine
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("Configuration error: {0}")]
    Config(#[from] domain_policy::ConfigError),

    #[error("Policy error: {0}")]
    Policy(#[from] domain_policy::PolicyError),

    #[error("Money error: {0}")]
    Money(#[from] core_kernel::MoneyError),

    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}
