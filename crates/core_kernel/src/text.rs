//! Text normalization for multilingual description matching
//!
//! Repair estimates arrive with German and French vendor spellings of the
//! same component names. All matching stages compare normalized text so that
//! "Ölkühler-Gehäuse" and "oelkuehler gehaeuse" resolve identically.

/// Fixed substitution table for diacritics and ligatures.
///
/// Kept as an explicit table rather than a Unicode decomposition pass so the
/// normalized form of a vocabulary term is stable across releases.
const SUBSTITUTIONS: &[(char, &str)] = &[
    ('ä', "a"),
    ('ö', "o"),
    ('ü', "u"),
    ('ß', "ss"),
    ('é', "e"),
    ('è', "e"),
    ('ê', "e"),
    ('ë', "e"),
    ('à', "a"),
    ('â', "a"),
    ('ç', "c"),
    ('î', "i"),
    ('ï', "i"),
    ('ô', "o"),
    ('û', "u"),
    ('ù', "u"),
];

fn substitute(c: char) -> Option<&'static str> {
    SUBSTITUTIONS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
}

/// Canonicalizes text for comparison across languages.
///
/// Lower-cases, strips diacritics using the fixed substitution table,
/// replaces punctuation with whitespace, and collapses runs of whitespace.
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if let Some(replacement) = substitute(c) {
            out.push_str(replacement);
        } else if c.is_alphanumeric() {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a description into normalized tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Canonicalizes an identifier-like name (category, component key).
///
/// Snake_case configuration keys are fixed points: `canonical_key("oil_cooler")`
/// is `"oil_cooler"`, and vendor spellings collapse onto the same form
/// (`canonical_key("Axle Drive")` is `"axle_drive"`).
pub fn canonical_key(s: &str) -> String {
    normalize(s).replace(' ', "_")
}

/// Terms at or below this normalized length must match exactly, never as
/// substrings. Three-letter abbreviations ("asr", "abs", "egr") collide with
/// unrelated long compound words far too often for containment to be safe.
pub const SHORT_TERM_LEN: usize = 3;

/// Checks whether a normalized term occurs in a normalized text.
///
/// Short terms (≤ [`SHORT_TERM_LEN`] chars) are matched by exact token
/// equality; longer terms by substring containment. Both arguments must
/// already be normalized.
pub fn term_in_text(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if term.chars().count() <= SHORT_TERM_LEN {
        text.split_whitespace().any(|token| token == term)
    } else {
        text.contains(term)
    }
}

/// Checks whether two normalized terms refer to the same component name.
///
/// Equality always matches. Containment in either direction is only allowed
/// when both terms are longer than [`SHORT_TERM_LEN`]; a short term on either
/// side demands exact equality.
pub fn terms_equivalent(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    if a.chars().count() <= SHORT_TERM_LEN || b.chars().count() <= SHORT_TERM_LEN {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// Canonicalizes a catalog part code for exact lookup.
///
/// Strips spaces, dashes, dots, and slashes; lower-cases the rest. Vendor
/// catalogs disagree on separator placement within the same code.
pub fn normalize_part_code(code: &str) -> String {
    code.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '/'))
        .flat_map(char::to_lowercase)
        .collect()
}
