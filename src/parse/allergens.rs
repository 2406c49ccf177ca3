//! Best-effort allergen extraction.
//!
//! Providers mark allergens and additives with short codes in parentheses
//! after a dish, e.g. `Currywurst (A,F,3)`. This module pulls those codes out
//! and strips them from the dish text.
//!
//! There is no guarantee these codes are parsed correctly. Markup differs
//! between providers and changes without notice, parenthesized text that
//! happens to look like a code list is taken as one, and codes written any
//! other way are missed. Treat the result as a hint, not as dietary advice.

use crate::utils::squash_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static ALLERGEN_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Z0-9]{1,3}(?:\s*,\s*[A-Z0-9]{1,3})*)\)").expect("allergen pattern is valid"));

static ALLERGEN_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,3}$").expect("allergen code pattern is valid"));

/// Collect every code from all parenthesized code groups in `text`.
pub fn collect_allergens(text: &str) -> BTreeSet<String> {
    ALLERGEN_GROUP
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .flat_map(|group| group.as_str().split(','))
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .collect()
}

/// Remove all allergen groups and collapse the whitespace left behind.
pub fn remove_allergens(text: &str) -> String {
    squash_whitespace(&ALLERGEN_GROUP.replace_all(text, " "))
}

/// Whether a free-text note is itself a bare allergen code (`"A"`, `"F3"`).
pub fn is_allergen_code(note: &str) -> bool {
    ALLERGEN_CODE.is_match(note.trim())
}
