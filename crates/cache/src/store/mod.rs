//! Cache store access.
//!
//! [`DocumentStore`] is the seam between the query pipeline and the concrete
//! document store: MongoDB in production ([`mongo::MongoStore`]), an
//! in-memory store ([`memory::MemoryStore`]) for tests and embedded use.
//! [`CacheBackend`] makes cache absence a state, not an error: callers select
//! behavior by pattern match instead of repeated "is the client set" guards.

pub mod memory;
pub mod mongo;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::config::CacheConfig;
use crate::error::CacheResult;

pub use memory::{MemoryStore, matches_filter, sort_documents};
pub use mongo::MongoStore;

/// The three logical cache collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCollection {
    /// Denormalized object documents, keyed by authoritative id.
    Objects,
    /// Denormalized routing metadata.
    Endpoints,
    /// Denormalized schema metadata.
    Schemas,
}

impl CacheCollection {
    /// The collection name in the store.
    pub fn name(self) -> &'static str {
        match self {
            CacheCollection::Objects => "objects",
            CacheCollection::Endpoints => "endpoints",
            CacheCollection::Schemas => "schemas",
        }
    }

    /// All collections, in warmup order.
    pub fn all() -> [CacheCollection; 3] {
        [
            CacheCollection::Objects,
            CacheCollection::Schemas,
            CacheCollection::Endpoints,
        ]
    }
}

impl fmt::Display for CacheCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sort/skip/limit window for a find.
#[derive(Debug, Clone, Default)]
pub struct FindWindow {
    /// Maximum documents to return.
    pub limit: Option<u64>,
    /// Documents to skip.
    pub skip: Option<u64>,
    /// Sort document (field to 1/-1).
    pub sort: Option<Document>,
}

impl FindWindow {
    /// A window returning everything, unsorted.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Storage operations the query engine needs from a document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns a human-readable name for this store.
    fn store_name(&self) -> &'static str;

    /// Finds documents matching a compiled filter.
    async fn find(
        &self,
        collection: CacheCollection,
        filter: Document,
        window: FindWindow,
    ) -> CacheResult<Vec<Document>>;

    /// Counts documents matching a compiled filter (pre-window).
    async fn count(&self, collection: CacheCollection, filter: Document) -> CacheResult<u64>;

    /// Runs an aggregation pipeline, returning its output documents.
    async fn aggregate(
        &self,
        collection: CacheCollection,
        pipeline: Vec<Document>,
    ) -> CacheResult<Vec<Document>>;

    /// Inserts or replaces a document, keyed by id. Last write wins.
    async fn upsert(
        &self,
        collection: CacheCollection,
        id: &str,
        document: Document,
    ) -> CacheResult<()>;

    /// Deletes a document by id. Returns whether anything was deleted.
    async fn delete(&self, collection: CacheCollection, id: &str) -> CacheResult<bool>;

    /// Lists all document ids in a collection. Maintenance use only.
    async fn ids(&self, collection: CacheCollection) -> CacheResult<Vec<String>>;

    /// (Re)builds the full-document text index backing bare `_search` terms.
    async fn ensure_text_index(&self, collection: CacheCollection) -> CacheResult<()>;
}

/// The cache backend: connected to a document store, or absent.
///
/// Absence is a permanent mode selected once from configuration, never an
/// error; every caller pattern-matches instead of probing a connection
/// handle.
#[derive(Clone)]
pub enum CacheBackend {
    /// A live document store.
    Connected(Arc<dyn DocumentStore>),
    /// No cache configured: reads fall back to the authoritative store,
    /// writes are no-ops.
    Disabled,
}

impl CacheBackend {
    /// Selects the backend from configuration: a set connection URI connects
    /// to MongoDB, an unset one selects degraded mode.
    pub async fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        match &config.uri {
            Some(uri) => {
                let store = MongoStore::connect(uri, &config.database).await?;
                tracing::info!(database = %config.database, "cache backend connected");
                Ok(CacheBackend::Connected(Arc::new(store)))
            }
            None => {
                tracing::info!("no cache url configured, running in degraded mode");
                Ok(CacheBackend::Disabled)
            }
        }
    }

    /// Wraps an in-memory store, for tests and embedded use.
    pub fn in_memory() -> Self {
        CacheBackend::Connected(Arc::new(MemoryStore::new()))
    }

    /// Returns the store when connected.
    pub fn store(&self) -> Option<&Arc<dyn DocumentStore>> {
        match self {
            CacheBackend::Connected(store) => Some(store),
            CacheBackend::Disabled => None,
        }
    }

    /// Returns true when a store is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, CacheBackend::Connected(_))
    }
}

impl fmt::Debug for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackend::Connected(store) => {
                f.debug_tuple("Connected").field(&store.store_name()).finish()
            }
            CacheBackend::Disabled => f.write_str("Disabled"),
        }
    }
}
