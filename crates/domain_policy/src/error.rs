//! Policy and configuration error types

use thiserror::Error;

/// Errors raised while interrogating a policy context
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Policy defines no coverage scale")]
    EmptyCoverageScale,

    #[error("Unknown coverage category: {0}")]
    UnknownCategory(String),

    #[error("Money error: {0}")]
    Money(#[from] core_kernel::MoneyError),
}

/// Errors raised while loading tenant configuration
///
/// All variants are fatal at process start. The engine must never fall back
/// to an empty vocabulary, which would classify every item as REVIEW_NEEDED.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Vocabulary is empty: {0}")]
    EmptyVocabulary(String),

    #[error("Invalid pattern '{label}': {source}")]
    BadPattern {
        label: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
