//! Authoritative-store boundary.
//!
//! The primary, transactional store is an external collaborator. This module
//! defines the repository traits the engine is given at construction time,
//! plus the plain record types they return. There is no ambient or static
//! access to the authoritative store: every component that needs it receives
//! an injected repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CacheResult;

/// One authoritative object record, schema-typed at runtime.
///
/// `attributes` carries the business payload; `embedded` carries one level of
/// sub-objects, each a JSON object with its own `_self.id` metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceObject {
    /// Stable identifier, the cache primary key.
    pub id: String,
    /// Id of the schema this object instantiates.
    pub schema_id: Uuid,
    /// Reference URI of the schema this object instantiates.
    pub schema_ref: String,
    /// Owning user, if any.
    pub owner_id: Option<String>,
    /// Owning organization, if any.
    pub organization_id: Option<String>,
    /// Business attributes, flattened into the cached document as-is.
    pub attributes: serde_json::Map<String, Value>,
    /// Embedded sub-objects (or arrays of sub-objects), one level deep.
    pub embedded: BTreeMap<String, Value>,
}

/// One authoritative schema record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSchema {
    /// Schema id.
    pub id: Uuid,
    /// Schema reference URI.
    pub reference: String,
    /// Human-readable schema name.
    pub name: String,
}

/// One authoritative endpoint record (routing metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEndpoint {
    /// Endpoint id.
    pub id: String,
    /// Path segments.
    pub path: Vec<String>,
    /// Compiled path-matching regex, if the endpoint declares one.
    pub path_regex: Option<String>,
    /// Accepted HTTP methods.
    pub methods: Vec<String>,
}

/// Read access to authoritative objects.
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// Fetches one object by id.
    async fn get(&self, id: &str) -> CacheResult<Option<SourceObject>>;

    /// Lists all objects.
    ///
    /// Used by warmup and by degraded-mode searches, where filtering happens
    /// in the engine; never on the connected request path.
    async fn list(&self) -> CacheResult<Vec<SourceObject>>;
}

/// Read access to authoritative schemas.
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// Fetches one schema by id.
    async fn get_by_id(&self, id: Uuid) -> CacheResult<Option<SourceSchema>>;

    /// Fetches one schema by reference URI.
    async fn get_by_reference(&self, reference: &str) -> CacheResult<Option<SourceSchema>>;

    /// Lists all schemas.
    async fn list(&self) -> CacheResult<Vec<SourceSchema>>;
}

/// Read access to authoritative endpoints.
#[async_trait]
pub trait EndpointRepository: Send + Sync {
    /// Fetches one endpoint by id.
    async fn get(&self, id: &str) -> CacheResult<Option<SourceEndpoint>>;

    /// Lists all endpoints.
    async fn list(&self) -> CacheResult<Vec<SourceEndpoint>>;
}
