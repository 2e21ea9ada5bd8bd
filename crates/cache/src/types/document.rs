//! Cached document shapes.
//!
//! The cache is a denormalized mirror of the authoritative store: every cached
//! document is keyed by the authoritative `id` (stored as `_id`) and carries a
//! `_self` metadata block with its schema identity and ownership, so that the
//! compiled tenancy and schema-scope clauses can target fixed dot-paths
//! without any static knowledge of the schema being served.

use mongodb::bson::{self, Bson, Document, doc};
use serde_json::Value;

use crate::error::CacheResult;
use crate::repository::{SourceEndpoint, SourceObject, SourceSchema};

/// Dot-path of the schema id inside a cached document.
pub const SELF_SCHEMA_ID: &str = "_self.schema.id";
/// Dot-path of the schema reference inside a cached document.
pub const SELF_SCHEMA_REF: &str = "_self.schema.ref";
/// Dot-path of the owning user inside a cached document.
pub const SELF_OWNER: &str = "_self.owner.id";
/// Dot-path of the owning organization inside a cached document.
pub const SELF_ORGANIZATION: &str = "_self.organization.id";

/// Builder for cached object documents.
///
/// A cached object flattens the authoritative record: business attributes at
/// the top level, embedded sub-objects one level deep under their attribute
/// name, each with a synthesized `id` copied from its `_self.id` for
/// backward-compatible client shapes.
pub struct CachedObject;

impl CachedObject {
    /// Serializes an authoritative object into its cached document shape.
    pub fn from_source(source: &SourceObject) -> CacheResult<Document> {
        let mut document = doc! {
            "_id": source.id.clone(),
            "id": source.id.clone(),
            "_self": {
                "id": source.id.clone(),
                "schema": {
                    "id": source.schema_id.to_string(),
                    "ref": source.schema_ref.clone(),
                },
                "owner": { "id": owner_bson(&source.owner_id) },
                "organization": { "id": owner_bson(&source.organization_id) },
            },
        };

        for (name, value) in &source.attributes {
            document.insert(name.clone(), bson::to_bson(value)?);
        }

        for (name, value) in &source.embedded {
            document.insert(name.clone(), embed(value)?);
        }

        Ok(document)
    }
}

fn owner_bson(id: &Option<String>) -> Bson {
    match id {
        Some(id) => Bson::String(id.clone()),
        None => Bson::Null,
    }
}

/// Serializes one embedded value, synthesizing `id` onto every sub-object.
fn embed(value: &Value) -> CacheResult<Bson> {
    match value {
        Value::Array(items) => {
            let embedded: CacheResult<Vec<Bson>> = items.iter().map(embed).collect();
            Ok(Bson::Array(embedded?))
        }
        Value::Object(map) => {
            let mut sub = Document::new();
            for (key, val) in map {
                sub.insert(key.clone(), bson::to_bson(val)?);
            }
            if let Some(id) = map
                .get("_self")
                .and_then(|meta| meta.get("id"))
                .and_then(Value::as_str)
            {
                sub.insert("id", id.to_string());
            }
            Ok(Bson::Document(sub))
        }
        other => Ok(bson::to_bson(other)?),
    }
}

/// Builder for cached endpoint documents (denormalized routing metadata).
pub struct CachedEndpoint;

impl CachedEndpoint {
    /// Serializes an authoritative endpoint into its cached document shape.
    pub fn from_source(source: &SourceEndpoint) -> Document {
        doc! {
            "_id": source.id.clone(),
            "id": source.id.clone(),
            "path": source.path.clone(),
            "pathRegex": match &source.path_regex {
                Some(regex) => Bson::String(regex.clone()),
                None => Bson::Null,
            },
            "methods": source.methods.clone(),
        }
    }
}

/// Builder for cached schema documents.
pub struct CachedSchema;

impl CachedSchema {
    /// Serializes an authoritative schema into its cached document shape.
    pub fn from_source(source: &SourceSchema) -> Document {
        doc! {
            "_id": source.id.to_string(),
            "id": source.id.to_string(),
            "reference": source.reference.clone(),
            "name": source.name.clone(),
        }
    }
}
