//! In-memory document store.
//!
//! Evaluates the same filter expressions the compiler emits for MongoDB
//! (`$eq`, `$ne`, `$in`, range operators, regexes, `$and`/`$or`, `$text`,
//! `$elemMatch`) against plain BSON documents. Used by the test suite and for
//! embedded setups that want cache semantics without a database.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};
use parking_lot::RwLock;

use super::{CacheCollection, DocumentStore, FindWindow};
use crate::error::{BackendError, CacheResult};

/// A thread-safe in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<CacheCollection, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn find(
        &self,
        collection: CacheCollection,
        filter: Document,
        window: FindWindow,
    ) -> CacheResult<Vec<Document>> {
        let collections = self.collections.read();
        let mut matched: Vec<Document> = collections
            .get(&collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| matches_filter(document, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = &window.sort {
            sort_documents(&mut matched, sort);
        }
        let skip = window.skip.unwrap_or(0) as usize;
        let matched: Vec<Document> = match window.limit {
            Some(limit) => matched.into_iter().skip(skip).take(limit as usize).collect(),
            None => matched.into_iter().skip(skip).collect(),
        };
        Ok(matched)
    }

    async fn count(&self, collection: CacheCollection, filter: Document) -> CacheResult<u64> {
        let collections = self.collections.read();
        Ok(collections
            .get(&collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| matches_filter(document, &filter))
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn aggregate(
        &self,
        collection: CacheCollection,
        pipeline: Vec<Document>,
    ) -> CacheResult<Vec<Document>> {
        let mut documents: Vec<Document> = {
            let collections = self.collections.read();
            collections
                .get(&collection)
                .map(|documents| documents.values().cloned().collect())
                .unwrap_or_default()
        };

        for stage in &pipeline {
            if let Ok(filter) = stage.get_document("$match") {
                documents.retain(|document| matches_filter(document, filter));
            } else if let Ok(path) = stage.get_str("$unwind") {
                documents = unwind(documents, path.trim_start_matches('$'));
            } else if let Ok(group) = stage.get_document("$group") {
                documents = group_count(documents, group);
            } else {
                let stage_name = stage.keys().next().cloned().unwrap_or_default();
                return Err(BackendError::Query {
                    message: format!("unsupported aggregation stage '{stage_name}'"),
                }
                .into());
            }
        }
        Ok(documents)
    }

    async fn upsert(
        &self,
        collection: CacheCollection,
        id: &str,
        document: Document,
    ) -> CacheResult<()> {
        let mut collections = self.collections.write();
        collections
            .entry(collection)
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn delete(&self, collection: CacheCollection, id: &str) -> CacheResult<bool> {
        let mut collections = self.collections.write();
        Ok(collections
            .get_mut(&collection)
            .and_then(|documents| documents.remove(id))
            .is_some())
    }

    async fn ids(&self, collection: CacheCollection) -> CacheResult<Vec<String>> {
        let collections = self.collections.read();
        Ok(collections
            .get(&collection)
            .map(|documents| documents.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn ensure_text_index(&self, _collection: CacheCollection) -> CacheResult<()> {
        // Text search scans documents directly; nothing to build.
        Ok(())
    }
}

/// Evaluates a compiled filter against one document.
pub fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => condition
            .as_array()
            .map(|groups| {
                groups.iter().all(|group| {
                    group
                        .as_document()
                        .is_some_and(|group| matches_filter(document, group))
                })
            })
            .unwrap_or(false),
        "$or" => condition
            .as_array()
            .map(|groups| {
                groups.iter().any(|group| {
                    group
                        .as_document()
                        .is_some_and(|group| matches_filter(document, group))
                })
            })
            .unwrap_or(false),
        "$text" => condition
            .as_document()
            .and_then(|clause| clause.get_str("$search").ok())
            .map(|term| text_matches(document, term))
            .unwrap_or(false),
        field => condition_matches(resolve_path(document, field), condition),
    })
}

fn condition_matches(value: Option<&Bson>, condition: &Bson) -> bool {
    match condition {
        Bson::Document(operators) if operators.keys().any(|key| key.starts_with('$')) => {
            operators.iter().all(|(operator, operand)| {
                match operator.as_str() {
                    "$eq" => equals(value, operand),
                    "$ne" => !equals(value, operand),
                    "$in" => operand
                        .as_array()
                        .map(|members| members.iter().any(|member| equals(value, member)))
                        .unwrap_or(false),
                    "$gt" => compare(value, operand) == Some(Ordering::Greater),
                    "$gte" => matches!(
                        compare(value, operand),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    "$lt" => compare(value, operand) == Some(Ordering::Less),
                    "$lte" => matches!(
                        compare(value, operand),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    "$elemMatch" => match (value, operand.as_document()) {
                        (Some(Bson::Array(items)), Some(sub_filter)) => {
                            items.iter().any(|item| {
                                item.as_document()
                                    .is_some_and(|item| matches_filter(item, sub_filter))
                            })
                        }
                        _ => false,
                    },
                    _ => false,
                }
            })
        }
        Bson::RegularExpression(raw) => {
            let pattern = if raw.options.contains('i') {
                format!("(?i){}", raw.pattern)
            } else {
                raw.pattern.clone()
            };
            let Ok(matcher) = regex::Regex::new(&pattern) else {
                return false;
            };
            match value {
                Some(Bson::String(text)) => matcher.is_match(text),
                Some(Bson::Array(items)) => items
                    .iter()
                    .any(|item| item.as_str().is_some_and(|text| matcher.is_match(text))),
                _ => false,
            }
        }
        literal => equals(value, literal),
    }
}

/// Equality with Mongo semantics: a missing field equals null, an array field
/// matches when any element matches.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, target))
        }
        Some(value) => bson_eq(value, target),
    }
}

/// Scalar equality with numeric cross-type comparison.
fn bson_eq(left: &Bson, right: &Bson) -> bool {
    match (numeric(left), numeric(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Partial ordering over numbers and strings. Dates are stored as ISO-8601
/// strings, so string ordering is chronological for them.
fn compare(value: Option<&Bson>, bound: &Bson) -> Option<Ordering> {
    let value = value?;
    if let (Some(a), Some(b)) = (numeric(value), numeric(bound)) {
        return a.partial_cmp(&b);
    }
    match (value, bound) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Best-effort full-text match: case-insensitive substring over every string
/// field in the document, nested documents and arrays included.
fn text_matches(document: &Document, term: &str) -> bool {
    let needle = term.to_lowercase();
    fn scan(value: &Bson, needle: &str) -> bool {
        match value {
            Bson::String(text) => text.to_lowercase().contains(needle),
            Bson::Document(document) => document.values().any(|value| scan(value, needle)),
            Bson::Array(items) => items.iter().any(|item| scan(item, needle)),
            _ => false,
        }
    }
    document.values().any(|value| scan(value, &needle))
}

/// Resolves a dot-path against nested documents.
fn resolve_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }
    Some(current)
}

/// Sorts documents by a store sort document (field to 1/-1). Also used by the
/// degraded-mode reader, which orders authoritative records the same way.
pub fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|left, right| {
        for (field, direction) in sort {
            let ordering = match (resolve_path(left, field), resolve_path(right, field)) {
                (Some(a), Some(b)) => compare(Some(a), b).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            let descending = matches!(direction.as_i32(), Some(-1))
                || matches!(direction.as_i64(), Some(-1));
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// `$unwind`: one output document per array element; scalars pass through,
/// missing fields drop the document.
fn unwind(documents: Vec<Document>, path: &str) -> Vec<Document> {
    let mut output = Vec::new();
    for document in documents {
        match resolve_path(&document, path).cloned() {
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut clone = document.clone();
                    set_path(&mut clone, path, item);
                    output.push(clone);
                }
            }
            Some(_) => output.push(document),
            None => {}
        }
    }
    output
}

fn set_path(document: &mut Document, path: &str, value: Bson) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let leaf = segments.pop().expect("path has at least one segment");
    let mut current = document;
    for segment in segments {
        if !matches!(current.get(segment), Some(Bson::Document(_))) {
            current.insert(segment, Document::new());
        }
        current = current
            .get_document_mut(segment)
            .expect("segment was just ensured to be a document");
    }
    current.insert(leaf, value);
}

/// `$group` with `_id: "$field"` and a single `{$sum: 1}` accumulator.
fn group_count(documents: Vec<Document>, group: &Document) -> Vec<Document> {
    let key_path = group
        .get_str("_id")
        .ok()
        .map(|key| key.trim_start_matches('$').to_string())
        .unwrap_or_default();
    let count_field = group
        .keys()
        .find(|key| key.as_str() != "_id")
        .cloned()
        .unwrap_or_else(|| "count".to_string());

    let mut buckets: Vec<(Bson, i64)> = Vec::new();
    for document in &documents {
        let key = resolve_path(document, &key_path)
            .cloned()
            .unwrap_or(Bson::Null);
        match buckets.iter_mut().find(|(existing, _)| existing == &key) {
            Some((_, count)) => *count += 1,
            None => buckets.push((key, 1)),
        }
    }

    buckets
        .into_iter()
        .map(|(key, count)| {
            let mut bucket = Document::new();
            bucket.insert("_id", key);
            bucket.insert(count_field.clone(), count);
            bucket
        })
        .collect()
}
