//! Query-parameter normalization.
//!
//! Legacy parameter names are rewritten into the canonical `_`-prefixed set
//! before any compilation happens. This is a pure function returning a new
//! map; the input is never mutated, which keeps the rest of the pipeline
//! composable.

use serde_json::{Map, Value};

/// Legacy name / canonical name pairs.
const ALIASES: [(&str, &str); 8] = [
    ("limit", "_limit"),
    ("start", "_start"),
    ("offset", "_offset"),
    ("page", "_page"),
    ("extend", "_extend"),
    ("search", "_search"),
    ("order", "_order"),
    ("fields", "_fields"),
];

/// Rewrites legacy parameter names into the canonical set.
///
/// For each alias: when the canonical key is absent and the legacy key is
/// present, the legacy value is copied over; the legacy key is always removed
/// afterwards. Plain filter keys pass through untouched. No error conditions.
pub fn normalize_query(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = raw.clone();
    for (legacy, canonical) in ALIASES {
        if let Some(value) = normalized.remove(legacy) {
            if !normalized.contains_key(canonical) {
                normalized.insert(canonical.to_string(), value);
            }
        }
    }
    normalized
}

/// Returns true for canonical directive keys that must not reach the
/// operator compiler.
pub fn is_directive(key: &str) -> bool {
    matches!(
        key,
        "_limit" | "_start" | "_offset" | "_page" | "_order" | "_search" | "_extend" | "_fields"
            | "_queries"
    )
}
