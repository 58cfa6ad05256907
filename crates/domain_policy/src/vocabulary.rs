//! Customer-specific component vocabulary
//!
//! Everything the matchers know about part nomenclature is data, not code:
//! synonym tables, category aliases, labor phrases, catalog mappings, and the
//! exclusion/consumable pattern lists all load from per-tenant configuration
//! so vocabulary changes never require a deployment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use core_kernel::{canonical_key, normalize};

use crate::error::ConfigError;

/// A part catalog entry resolving a code or keyword to a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub component: String,
    pub category: String,
}

/// A labor phrase resolving to the component being worked on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairHint {
    pub component: String,
    pub category: String,
}

/// A labeled regular expression sourced from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Short label carried into the verdict reasoning
    pub label: String,
    /// Regular expression evaluated against the normalized description
    pub pattern: String,
}

/// Disambiguation hint for polysemous terms
///
/// When `term` appears near `context` (same item or a neighboring item in the
/// claim), it resolves to the given component and category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextHint {
    pub term: String,
    pub context: String,
    pub component: String,
    pub category: String,
}

/// Policy-independent part catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartCatalog {
    /// Normalized catalog code to component
    #[serde(default)]
    pub by_part_number: HashMap<String, CatalogEntry>,
    /// Description keyword to component, the secondary lookup
    #[serde(default)]
    pub by_keyword: HashMap<String, CatalogEntry>,
}

/// A single dictionary entry produced for the keyword matcher
#[derive(Debug, Clone)]
pub struct TermEntry {
    /// Normalized term
    pub term: String,
    /// Canonical component name
    pub component: String,
    /// Canonical category
    pub category: String,
}

/// Per-tenant vocabulary, externally configured
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentVocabulary {
    /// Component to multilingual synonym terms
    #[serde(default)]
    pub component_synonyms: HashMap<String, Vec<String>>,
    /// Component to canonical category
    #[serde(default)]
    pub component_categories: HashMap<String, String>,
    /// Vendor category spellings to canonical category names
    #[serde(default)]
    pub category_aliases: HashMap<String, String>,
    /// Labor phrase to repaired component
    #[serde(default)]
    pub repair_context_keywords: HashMap<String, RepairHint>,
    /// Part catalog lookups
    #[serde(default)]
    pub part_catalog: PartCatalog,
    /// Items matching these are never covered (fees, disposal, rental, ...)
    #[serde(default)]
    pub exclusion_patterns: Vec<PatternRule>,
    /// Consumables and wear parts (oils, filters, standalone gaskets, ...)
    #[serde(default)]
    pub consumable_patterns: Vec<PatternRule>,
    /// Terms marking an item as a gasket/seal ancillary
    #[serde(default)]
    pub gasket_indicators: Vec<String>,
    /// Context-dependent disambiguation hints
    #[serde(default)]
    pub context_hints: Vec<ContextHint>,
    /// Terms that fall through to the distribution catch-all category
    #[serde(default)]
    pub distribution_catch_all_terms: Vec<String>,
    /// Category assigned to catch-all hits
    #[serde(default)]
    pub distribution_catch_all_category: Option<String>,
}

impl ComponentVocabulary {
    /// Loads and validates a vocabulary from a JSON or YAML file.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, malformed content, uncompilable patterns,
    /// or an effectively empty vocabulary. All of these are fatal at process
    /// start.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let vocabulary: Self = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    /// Loads and validates a vocabulary from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let vocabulary: Self = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Json))
            .build()?
            .try_deserialize()?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    /// Validates the vocabulary after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.component_synonyms.is_empty()
            && self.part_catalog.by_part_number.is_empty()
            && self.repair_context_keywords.is_empty()
        {
            return Err(ConfigError::EmptyVocabulary(
                "no synonyms, catalog entries, or repair context keywords defined".to_string(),
            ));
        }

        for rule in self
            .exclusion_patterns
            .iter()
            .chain(self.consumable_patterns.iter())
        {
            regex::Regex::new(&rule.pattern).map_err(|e| ConfigError::BadPattern {
                label: rule.label.clone(),
                source: Box::new(e),
            })?;
        }

        if !self.distribution_catch_all_terms.is_empty()
            && self.distribution_catch_all_category.is_none()
        {
            return Err(ConfigError::Invalid(
                "distribution_catch_all_terms defined without a catch-all category".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolves a raw category spelling to its canonical key.
    pub fn resolve_category(&self, raw: &str) -> String {
        let key = canonical_key(raw);
        for (alias, canonical) in &self.category_aliases {
            if canonical_key(alias) == key {
                return canonical_key(canonical);
            }
        }
        key
    }

    /// Expands a component name into its normalized synonym set.
    ///
    /// The returned list always contains the normalized input. When the input
    /// matches a synonym entry (by key or by member), every spelling of that
    /// entry is included so policy-list checks see all vendor variants.
    pub fn expand_component(&self, component: &str) -> Vec<String> {
        let normalized = normalize(component);
        let mut out = vec![normalized.clone()];
        for (canonical, synonyms) in &self.component_synonyms {
            let canonical_norm = normalize(canonical);
            let member = canonical_norm == normalized
                || synonyms.iter().any(|s| normalize(s) == normalized);
            if member {
                if !out.contains(&canonical_norm) {
                    out.push(canonical_norm);
                }
                for synonym in synonyms {
                    let s = normalize(synonym);
                    if !out.contains(&s) {
                        out.push(s);
                    }
                }
            }
        }
        out
    }

    /// Returns the canonical category for a component, when configured.
    pub fn category_for_component(&self, component: &str) -> Option<String> {
        let key = canonical_key(component);
        self.component_categories
            .iter()
            .find(|(name, _)| canonical_key(name) == key)
            .map(|(_, category)| self.resolve_category(category))
    }

    /// Builds the term dictionary for the keyword matcher.
    ///
    /// Longest terms first, so the most specific synonym wins when several
    /// match the same description.
    pub fn term_entries(&self) -> Vec<TermEntry> {
        let mut entries = Vec::new();
        for (component, synonyms) in &self.component_synonyms {
            let Some(category) = self.category_for_component(component) else {
                tracing::warn!(component = %component, "component has no category mapping, skipping");
                continue;
            };
            let mut terms: Vec<String> = vec![normalize(component)];
            terms.extend(synonyms.iter().map(|s| normalize(s)));
            for term in terms {
                if term.is_empty() {
                    continue;
                }
                entries.push(TermEntry {
                    term,
                    // Verdicts carry the configured key, not the normalized
                    // matching form.
                    component: component.clone(),
                    category: category.clone(),
                });
            }
        }
        entries.sort_by(|a, b| b.term.len().cmp(&a.term.len()).then(a.term.cmp(&b.term)));
        entries
    }

    #[cfg(test)]
    pub(crate) fn minimal_for_tests() -> Self {
        Self {
            component_synonyms: HashMap::from([
                (
                    "oil_cooler".to_string(),
                    vec!["olkuhler".to_string(), "radiateur d'huile".to_string()],
                ),
                ("asr".to_string(), vec![]),
            ]),
            component_categories: HashMap::from([
                ("oil_cooler".to_string(), "engine".to_string()),
                ("asr".to_string(), "brakes".to_string()),
            ]),
            ..Default::default()
        }
    }
}
