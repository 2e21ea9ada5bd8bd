//! Schema scoping.
//!
//! Resolves a list of schema ids or reference URIs into schema-identity
//! constraints on the compiled filter. A reference that fails to resolve is
//! logged and skipped rather than failing the query: the filter simply
//! narrows less than requested.

use mongodb::bson::{Bson, Document, doc};
use uuid::Uuid;

use crate::error::{CacheResult, ResolutionError};
use crate::repository::SchemaRepository;
use crate::types::document::{SELF_SCHEMA_ID, SELF_SCHEMA_REF};

/// Narrows a filter to the given schemas.
///
/// Entries that parse as UUIDs constrain `_self.schema.id`; all other entries
/// constrain `_self.schema.ref`. Each entry is validated against the
/// authoritative schema repository first.
pub async fn scope_to_schemas(
    filter: &mut Document,
    entries: &[String],
    schemas: &dyn SchemaRepository,
) -> CacheResult<()> {
    let mut ids: Vec<Bson> = Vec::new();
    let mut refs: Vec<Bson> = Vec::new();

    for entry in entries {
        match resolve_entry(entry, schemas).await? {
            Ok(ScopeEntry::Id(id)) => ids.push(Bson::String(id.to_string())),
            Ok(ScopeEntry::Reference(reference)) => refs.push(Bson::String(reference)),
            Err(error) => {
                tracing::warn!(schema = %entry, error = %error, "skipping unresolvable schema scope entry");
            }
        }
    }

    if !ids.is_empty() {
        filter.insert(SELF_SCHEMA_ID, doc! { "$in": ids });
    }
    if !refs.is_empty() {
        filter.insert(SELF_SCHEMA_REF, doc! { "$in": refs });
    }
    Ok(())
}

enum ScopeEntry {
    Id(Uuid),
    Reference(String),
}

/// Outer error: repository failure. Inner error: entry does not resolve.
async fn resolve_entry(
    entry: &str,
    schemas: &dyn SchemaRepository,
) -> CacheResult<Result<ScopeEntry, ResolutionError>> {
    if let Ok(id) = Uuid::parse_str(entry) {
        return Ok(match schemas.get_by_id(id).await? {
            Some(_) => Ok(ScopeEntry::Id(id)),
            None => Err(ResolutionError::SchemaIdNotFound { id }),
        });
    }
    Ok(match schemas.get_by_reference(entry).await? {
        Some(schema) => Ok(ScopeEntry::Reference(schema.reference)),
        None => Err(ResolutionError::SchemaRefNotFound {
            reference: entry.to_string(),
        }),
    })
}

/// Per-attribute `sortable`/`searchable` allow-list enforcement.
///
/// Deliberately disabled: kept as a re-enablable extension point so callers
/// keep a stable seam to hook attribute metadata into.
pub fn validate_order_fields(_order: &[(String, crate::types::SortDirection)]) -> CacheResult<()> {
    Ok(())
}
