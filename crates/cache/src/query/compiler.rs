//! The operator compiler.
//!
//! For a single filter value, decides whether it denotes literal equality, a
//! keyword operator, or a set-membership test, and rewrites it into a
//! [`FilterValue`]. Operator detection is ordered; the first matching rule
//! wins, and cast rules (`int_compare`, `bool_compare`) may leave an array
//! behind for the set-membership rule to pick up.
//!
//! Default string semantics are exact-match: an unadorned string compiles to
//! an anchored, fully-escaped, case-insensitive regex, so `status=active`
//! matches `"Active"` but not `"active-ish"`. A `%` in the string switches to
//! substring-wildcard semantics instead.

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::{self, Bson, Document};
use serde_json::{Map, Value};

use crate::error::{CacheResult, CompilationError};
use crate::query::normalize::is_directive;
use crate::types::filter::{FilterValue, RangeOp};

/// Compiles every plain key of a normalized query map into one store filter.
///
/// Directive keys (`_limit` and friends) are skipped; top-level `$and`/`$or`
/// groups are compiled recursively so user-supplied OR groups keep working.
pub fn compile_filter(plain: &Map<String, Value>) -> CacheResult<Document> {
    let mut filter = Document::new();
    for (key, value) in plain {
        if is_directive(key) {
            continue;
        }
        if (key == "$and" || key == "$or") && value.is_array() {
            let groups: CacheResult<Vec<Bson>> = value
                .as_array()
                .unwrap()
                .iter()
                .map(|group| match group {
                    Value::Object(map) => Ok(Bson::Document(compile_filter(map)?)),
                    other => Ok(bson::to_bson(other)?),
                })
                .collect();
            filter.insert(key.clone(), Bson::Array(groups?));
            continue;
        }
        filter.insert(key.clone(), compile_value(key, value)?.into_bson());
    }
    Ok(filter)
}

/// Compiles one filter value into its tagged intermediate form.
pub fn compile_value(field: &str, value: &Value) -> CacheResult<FilterValue> {
    match value {
        Value::Object(map) => compile_operator_map(field, map),
        Value::Array(items) => {
            let members: CacheResult<Vec<Bson>> =
                items.iter().map(|item| Ok(bson::to_bson(item)?)).collect();
            Ok(FilterValue::SetMembership(members?))
        }
        Value::Bool(flag) => Ok(FilterValue::Literal(Bson::Boolean(*flag))),
        Value::Number(_) => Ok(FilterValue::Literal(bson::to_bson(value)?)),
        Value::Null => Ok(FilterValue::Literal(Bson::Null)),
        Value::String(text) => compile_scalar_string(text),
    }
}

/// Date-range operator keys, in detection order.
const DATE_KEYS: [(&str, RangeOp); 4] = [
    ("after", RangeOp::Gte),
    ("strictly_after", RangeOp::Gt),
    ("before", RangeOp::Lte),
    ("strictly_before", RangeOp::Lt),
];

/// Relational operator keys.
const RELATIONAL_KEYS: [(&str, RangeOp); 4] = [
    (">", RangeOp::Gt),
    (">=", RangeOp::Gte),
    ("<", RangeOp::Lt),
    ("<=", RangeOp::Lte),
];

fn compile_operator_map(field: &str, map: &Map<String, Value>) -> CacheResult<FilterValue> {
    if let Some(payload) = map.get("int_compare") {
        return compile_cast(field, payload, |field, value| {
            cast_int_bson(field, "int_compare", value)
        });
    }

    if let Some(payload) = map.get("bool_compare") {
        return compile_cast(field, payload, cast_bool);
    }

    if DATE_KEYS.iter().any(|(key, _)| map.contains_key(*key)) {
        let mut bounds = Vec::new();
        for (key, op) in DATE_KEYS {
            if let Some(raw) = map.get(key) {
                let text = scalar_text(raw);
                let formatted = parse_date(field, &text)?;
                bounds.push((op, Bson::String(formatted)));
            }
        }
        return Ok(FilterValue::Range(bounds));
    }

    if let Some(payload) = map.get("like") {
        let escaped = regex::escape(&scalar_text(payload));
        return Ok(FilterValue::Pattern {
            pattern: format!(".*{escaped}.*"),
            case_insensitive: true,
        });
    }

    if let Some(payload) = map.get("regex") {
        return Ok(FilterValue::Pattern {
            pattern: scalar_text(payload),
            case_insensitive: false,
        });
    }

    if RELATIONAL_KEYS.iter().any(|(key, _)| map.contains_key(*key)) {
        let mut bounds = Vec::new();
        for (key, op) in RELATIONAL_KEYS {
            if let Some(raw) = map.get(key) {
                bounds.push((op, Bson::Int64(cast_int(field, key, raw)?)));
            }
        }
        return Ok(FilterValue::Range(bounds));
    }

    if let Some(payload) = map.get("exact") {
        // Opts out of any further rewriting.
        return match payload {
            Value::Object(inner) => {
                let mut document = Document::new();
                for (key, value) in inner {
                    document.insert(key.clone(), bson::to_bson(value)?);
                }
                Ok(FilterValue::Composite(document))
            }
            other => Ok(FilterValue::Literal(bson::to_bson(other)?)),
        };
    }

    if let Some(payload) = map.get("case_insensitive") {
        return Ok(FilterValue::Pattern {
            pattern: scalar_text(payload),
            case_insensitive: true,
        });
    }

    if let Some(payload) = map.get("case_sensitive") {
        return Ok(FilterValue::Pattern {
            pattern: scalar_text(payload),
            case_insensitive: false,
        });
    }

    if let Some(payload) = map.get("ne") {
        return Ok(FilterValue::Negation(bson::to_bson(payload)?));
    }

    if map.contains_key("$elemMatch") {
        // The caller built the expression manually; pass it through untouched.
        let mut document = Document::new();
        for (key, value) in map {
            document.insert(key.clone(), bson::to_bson(value)?);
        }
        return Ok(FilterValue::Composite(document));
    }

    let operator = map.keys().next().cloned().unwrap_or_default();
    Err(CompilationError::UnknownOperator {
        field: field.to_string(),
        operator,
    }
    .into())
}

/// Applies a cast to an operator payload: a scalar becomes a direct equality,
/// an array is mapped element-wise and falls through to set membership.
fn compile_cast<F>(field: &str, payload: &Value, cast: F) -> CacheResult<FilterValue>
where
    F: Fn(&str, &Value) -> CacheResult<Bson>,
{
    match payload {
        Value::Array(items) => {
            let members: CacheResult<Vec<Bson>> =
                items.iter().map(|item| cast(field, item)).collect();
            Ok(FilterValue::SetMembership(members?))
        }
        scalar => Ok(FilterValue::Literal(cast(field, scalar)?)),
    }
}

fn cast_int(field: &str, operator: &str, value: &Value) -> CacheResult<i64> {
    match value {
        Value::Number(n) if n.as_i64().is_some() => Ok(n.as_i64().unwrap()),
        Value::String(s) => s.trim().parse().map_err(|_| {
            CompilationError::InvalidInteger {
                field: field.to_string(),
                operator: operator.to_string(),
                value: s.clone(),
            }
            .into()
        }),
        other => Err(CompilationError::InvalidInteger {
            field: field.to_string(),
            operator: operator.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

fn cast_int_bson(field: &str, operator: &str, value: &Value) -> CacheResult<Bson> {
    Ok(Bson::Int64(cast_int(field, operator, value)?))
}

fn cast_bool(field: &str, value: &Value) -> CacheResult<Bson> {
    match value {
        Value::Bool(flag) => Ok(Bson::Boolean(*flag)),
        Value::String(s) => match s.trim() {
            "true" | "1" => Ok(Bson::Boolean(true)),
            "false" | "0" => Ok(Bson::Boolean(false)),
            other => Err(CompilationError::InvalidBoolean {
                field: field.to_string(),
                value: other.to_string(),
            }
            .into()),
        },
        Value::Number(n) if n.as_i64() == Some(0) => Ok(Bson::Boolean(false)),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(Bson::Boolean(true)),
        other => Err(CompilationError::InvalidBoolean {
            field: field.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

/// Parses a date bound and reformats it as ISO-8601.
///
/// Accepts full RFC 3339 timestamps and bare `YYYY-MM-DD` dates. Malformed
/// input propagates as a compilation error rather than silently dropping the
/// clause.
fn parse_date(field: &str, value: &str) -> CacheResult<String> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc).to_rfc3339()),
        Err(rfc3339_error) => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) => {
                let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
                Ok(midnight.to_rfc3339())
            }
            Err(_) => Err(CompilationError::InvalidDate {
                field: field.to_string(),
                value: value.to_string(),
                source: rfc3339_error,
            }
            .into()),
        },
    }
}

fn compile_scalar_string(text: &str) -> CacheResult<FilterValue> {
    if text == "IS NOT NULL" {
        return Ok(FilterValue::Negation(Bson::Null));
    }
    if text == "IS NULL" || text == "null" {
        return Ok(FilterValue::Literal(Bson::Null));
    }
    if text.contains('%') {
        // `%` wildcards select substring semantics, everything else escaped.
        let pattern = text
            .split('%')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        return Ok(FilterValue::Pattern {
            pattern,
            case_insensitive: true,
        });
    }
    Ok(FilterValue::Pattern {
        pattern: format!("^{}$", regex::escape(text)),
        case_insensitive: true,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use serde_json::json;

    fn compiled(field: &str, value: Value) -> Bson {
        compile_value(field, &value).unwrap().into_bson()
    }

    fn regex_for(value: Value) -> regex::Regex {
        match compiled("name", value) {
            Bson::RegularExpression(raw) => {
                let pattern = if raw.options.contains('i') {
                    format!("(?i){}", raw.pattern)
                } else {
                    raw.pattern
                };
                regex::Regex::new(&pattern).unwrap()
            }
            other => panic!("expected a regex, got {:?}", other),
        }
    }

    #[test]
    fn test_relational_operator_translation() {
        let expression = compiled("age", json!({ ">=": "18" }));
        assert_eq!(expression, Bson::Document(doc! { "$gte": 18i64 }));
    }

    #[test]
    fn test_combined_relational_bounds() {
        let expression = compiled("age", json!({ ">=": "18", "<": "65" }));
        assert_eq!(
            expression,
            Bson::Document(doc! { "$gte": 18i64, "$lt": 65i64 })
        );
    }

    #[test]
    fn test_relational_rejects_non_integer() {
        let result = compile_value("age", &json!({ ">=": "eighteen" }));
        assert!(matches!(
            result,
            Err(crate::error::CacheError::Compilation(
                CompilationError::InvalidInteger { .. }
            ))
        ));
    }

    #[test]
    fn test_wildcard_substring_match() {
        let matcher = regex_for(json!("%ann%"));
        assert!(matcher.is_match("Anna"));
        assert!(matcher.is_match("Hannah"));
        assert!(!matcher.is_match("Bob"));
    }

    #[test]
    fn test_default_string_is_anchored_exact_match() {
        let matcher = regex_for(json!("active"));
        assert!(matcher.is_match("active"));
        assert!(matcher.is_match("Active"));
        assert!(!matcher.is_match("active-ish"));
    }

    #[test]
    fn test_default_string_escapes_metacharacters() {
        let matcher = regex_for(json!("a.b+c"));
        assert!(matcher.is_match("a.b+c"));
        assert!(!matcher.is_match("axb+c"));
    }

    #[test]
    fn test_null_literals() {
        assert_eq!(
            compiled("field", json!("IS NULL")),
            Bson::Document(doc! { "$eq": Bson::Null })
        );
        assert_eq!(
            compiled("field", json!("null")),
            Bson::Document(doc! { "$eq": Bson::Null })
        );
        assert_eq!(
            compiled("field", json!("IS NOT NULL")),
            Bson::Document(doc! { "$ne": Bson::Null })
        );
    }

    #[test]
    fn test_booleans_and_integers_become_explicit_equality() {
        assert_eq!(
            compiled("active", json!(true)),
            Bson::Document(doc! { "$eq": true })
        );
        assert_eq!(
            compiled("age", json!(34)),
            Bson::Document(doc! { "$eq": 34i64 })
        );
    }

    #[test]
    fn test_array_becomes_set_membership() {
        assert_eq!(
            compiled("status", json!(["open", "closed"])),
            Bson::Document(doc! { "$in": ["open", "closed"] })
        );
    }

    #[test]
    fn test_int_compare_scalar_and_array() {
        assert_eq!(
            compiled("age", json!({ "int_compare": "34" })),
            Bson::Document(doc! { "$eq": 34i64 })
        );
        assert_eq!(
            compiled("age", json!({ "int_compare": ["18", "21"] })),
            Bson::Document(doc! { "$in": [18i64, 21i64] })
        );
    }

    #[test]
    fn test_bool_compare_cast() {
        assert_eq!(
            compiled("active", json!({ "bool_compare": "1" })),
            Bson::Document(doc! { "$eq": true })
        );
    }

    #[test]
    fn test_date_range_bounds() {
        let expression = compiled(
            "created",
            json!({ "after": "2024-01-01", "strictly_before": "2024-06-01T12:00:00+00:00" }),
        );
        let document = match expression {
            Bson::Document(document) => document,
            other => panic!("expected a document, got {:?}", other),
        };
        assert!(document.get_str("$gte").unwrap().starts_with("2024-01-01T00:00:00"));
        assert!(document.get_str("$lt").unwrap().starts_with("2024-06-01T12:00:00"));
    }

    #[test]
    fn test_malformed_date_propagates() {
        let result = compile_value("created", &json!({ "after": "not-a-date" }));
        assert!(matches!(
            result,
            Err(crate::error::CacheError::Compilation(
                CompilationError::InvalidDate { .. }
            ))
        ));
    }

    #[test]
    fn test_like_and_regex_operators() {
        let matcher = regex_for(json!({ "like": "an.na" }));
        assert!(matcher.is_match("xxAN.NAxx"));
        assert!(!matcher.is_match("anxna"));

        let expression = compiled("name", json!({ "regex": "^A" }));
        match expression {
            Bson::RegularExpression(raw) => {
                assert_eq!(raw.pattern, "^A");
                assert_eq!(raw.options, "");
            }
            other => panic!("expected a regex, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_opts_out_of_rewriting() {
        assert_eq!(
            compiled("name", json!({ "exact": "Ann%a" })),
            Bson::Document(doc! { "$eq": "Ann%a" })
        );
    }

    #[test]
    fn test_ne_negates() {
        assert_eq!(
            compiled("status", json!({ "ne": "closed" })),
            Bson::Document(doc! { "$ne": "closed" })
        );
    }

    #[test]
    fn test_elem_match_passthrough() {
        let expression = compiled(
            "items",
            json!({ "$elemMatch": { "sku": "a-1" } }),
        );
        assert_eq!(
            expression,
            Bson::Document(doc! { "$elemMatch": { "sku": "a-1" } })
        );
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let result = compile_value("age", &json!({ "between": [1, 2] }));
        assert!(matches!(
            result,
            Err(crate::error::CacheError::Compilation(
                CompilationError::UnknownOperator { .. }
            ))
        ));
    }

    #[test]
    fn test_compile_filter_skips_directives_and_keeps_or_groups() {
        let mut plain = serde_json::Map::new();
        plain.insert("_limit".to_string(), json!("10"));
        plain.insert("age".to_string(), json!({ ">=": "18" }));
        plain.insert(
            "$or".to_string(),
            json!([{ "status": "open" }, { "status": "pending" }]),
        );

        let filter = compile_filter(&plain).unwrap();
        assert!(!filter.contains_key("_limit"));
        assert_eq!(filter.get_document("age").unwrap(), &doc! { "$gte": 18i64 });
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);
    }
}
