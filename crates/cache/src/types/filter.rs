//! Filter value and complete-filter types.
//!
//! [`FilterValue`] is the tagged intermediate the operator compiler produces
//! for one filter key before rendering to a store expression; it replaces
//! runtime type-sniffing on raw JSON shapes. [`CompleteFilter`] is the
//! *uncompiled* superset of a query: it additionally retains the pagination,
//! ordering, and search directives, is used only to reconstruct the result
//! envelope after the query runs, and must never itself be sent to the store.

use std::fmt;

use mongodb::bson::{Bson, Document, Regex, doc};
use serde_json::Value;

/// Relational operator in a compiled range expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl RangeOp {
    /// The store operator this renders to.
    pub fn operator(self) -> &'static str {
        match self {
            RangeOp::Gt => "$gt",
            RangeOp::Gte => "$gte",
            RangeOp::Lt => "$lt",
            RangeOp::Lte => "$lte",
        }
    }
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

/// One compiled filter value, ready to render into a store expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Explicit equality (`$eq`).
    Literal(Bson),
    /// One or more relational bounds combined on a single field.
    Range(Vec<(RangeOp, Bson)>),
    /// Regular-expression match.
    Pattern {
        /// The pattern, already escaped where escaping applies.
        pattern: String,
        /// Whether the match ignores case.
        case_insensitive: bool,
    },
    /// Set membership (`$in`).
    SetMembership(Vec<Bson>),
    /// Negated equality (`$ne`).
    Negation(Bson),
    /// A caller-built expression passed through untouched (`$elemMatch` and
    /// friends).
    Composite(Document),
}

impl FilterValue {
    /// Renders this value into the expression placed under its field key.
    pub fn into_bson(self) -> Bson {
        match self {
            FilterValue::Literal(value) => Bson::Document(doc! { "$eq": value }),
            FilterValue::Range(bounds) => {
                let mut expression = Document::new();
                for (op, value) in bounds {
                    expression.insert(op.operator(), value);
                }
                Bson::Document(expression)
            }
            FilterValue::Pattern {
                pattern,
                case_insensitive,
            } => Bson::RegularExpression(Regex {
                pattern,
                options: if case_insensitive {
                    "i".to_string()
                } else {
                    String::new()
                },
            }),
            FilterValue::SetMembership(values) => Bson::Document(doc! { "$in": values }),
            FilterValue::Negation(value) => Bson::Document(doc! { "$ne": value }),
            FilterValue::Composite(document) => Bson::Document(document),
        }
    }
}

/// Sort direction for one `_order` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending (`1`).
    Asc,
    /// Descending (`-1`).
    Desc,
}

impl SortDirection {
    /// Parses `asc`/`desc`, case-insensitively. Anything else sorts ascending.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    /// The store sort value (`1`/`-1`).
    pub fn store_value(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// A `_search` directive.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchDirective {
    /// Bare free-text term, served by the collection text index.
    Text(String),
    /// Per-field search: each entry pairs a field list (from a comma-joined
    /// key) with its term.
    Fielded(Vec<(Vec<String>, String)>),
}

/// The uncompiled query directives retained for envelope bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteFilter {
    /// Requested page size (`_limit`).
    pub limit: Option<u64>,
    /// Requested row offset (`_start`).
    pub start: Option<u64>,
    /// Alternate row offset (`_offset`).
    pub offset: Option<u64>,
    /// Requested 1-based page (`_page`).
    pub page: Option<u64>,
    /// Ordering directives (`_order`), in declaration order.
    pub order: Vec<(String, SortDirection)>,
    /// Search directive (`_search`).
    pub search: Option<SearchDirective>,
    /// Embed paths (`_extend`). Accepted and carried; resolution happens in
    /// the calling layer.
    pub extend: Vec<String>,
    /// Projection fields (`_fields`). Accepted, not enforced in the compiled
    /// filter.
    pub fields: Vec<String>,
    /// Facet-count fields (`_queries`).
    pub queries: Vec<String>,
}

impl CompleteFilter {
    /// Extracts the directives from a normalized query map.
    pub fn from_normalized(normalized: &serde_json::Map<String, Value>) -> Self {
        let search = match normalized.get("_search") {
            Some(Value::String(term)) if !term.is_empty() => {
                Some(SearchDirective::Text(term.clone()))
            }
            Some(Value::Object(map)) => {
                let entries: Vec<(Vec<String>, String)> = map
                    .iter()
                    .filter_map(|(fields, term)| {
                        let term = term.as_str()?;
                        let fields: Vec<String> =
                            fields.split(',').map(|f| f.trim().to_string()).collect();
                        Some((fields, term.to_string()))
                    })
                    .collect();
                if entries.is_empty() {
                    None
                } else {
                    Some(SearchDirective::Fielded(entries))
                }
            }
            _ => None,
        };

        let order = match normalized.get("_order") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(field, direction)| {
                    let direction = direction.as_str().map(SortDirection::parse);
                    (field.clone(), direction.unwrap_or(SortDirection::Asc))
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            limit: parse_u64(normalized.get("_limit")),
            start: parse_u64(normalized.get("_start")),
            offset: parse_u64(normalized.get("_offset")),
            page: parse_u64(normalized.get("_page")),
            order,
            search,
            extend: string_list(normalized.get("_extend")),
            fields: string_list(normalized.get("_fields")),
            queries: string_list(normalized.get("_queries")),
        }
    }

    /// Builds the store sort document from `_order`, or `None` when unordered.
    pub fn sort_document(&self) -> Option<Document> {
        if self.order.is_empty() {
            return None;
        }
        let mut sort = Document::new();
        for (field, direction) in &self.order {
            sort.insert(field.clone(), direction.store_value());
        }
        Some(sort)
    }
}

/// Query-string values arrive as strings; numbers are accepted too.
fn parse_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a comma-separated string or an array of strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_value_rendering() {
        let range = FilterValue::Range(vec![
            (RangeOp::Gte, Bson::Int64(18)),
            (RangeOp::Lt, Bson::Int64(65)),
        ]);
        assert_eq!(range.into_bson(), Bson::Document(doc! { "$gte": 18i64, "$lt": 65i64 }));

        let membership =
            FilterValue::SetMembership(vec![Bson::String("a".into()), Bson::String("b".into())]);
        assert_eq!(
            membership.into_bson(),
            Bson::Document(doc! { "$in": ["a", "b"] })
        );

        let pattern = FilterValue::Pattern {
            pattern: "^active$".to_string(),
            case_insensitive: true,
        };
        match pattern.into_bson() {
            Bson::RegularExpression(regex) => {
                assert_eq!(regex.pattern, "^active$");
                assert_eq!(regex.options, "i");
            }
            other => panic!("expected a regex, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_filter_extraction() {
        let mut normalized = serde_json::Map::new();
        normalized.insert("_limit".to_string(), json!("10"));
        normalized.insert("_page".to_string(), json!(2));
        normalized.insert("_order".to_string(), json!({ "name": "DESC" }));
        normalized.insert("_fields".to_string(), json!("name,age"));
        normalized.insert("_queries".to_string(), json!(["status"]));

        let complete = CompleteFilter::from_normalized(&normalized);
        assert_eq!(complete.limit, Some(10));
        assert_eq!(complete.page, Some(2));
        assert_eq!(complete.order, vec![("name".to_string(), SortDirection::Desc)]);
        assert_eq!(complete.fields, vec!["name", "age"]);
        assert_eq!(complete.queries, vec!["status"]);
        assert_eq!(complete.sort_document(), Some(doc! { "name": -1 }));
    }

    #[test]
    fn test_fielded_search_extraction() {
        let mut normalized = serde_json::Map::new();
        normalized.insert("_search".to_string(), json!({ "name,email": "ann" }));

        let complete = CompleteFilter::from_normalized(&normalized);
        assert_eq!(
            complete.search,
            Some(SearchDirective::Fielded(vec![(
                vec!["name".to_string(), "email".to_string()],
                "ann".to_string()
            )]))
        );
    }
}
