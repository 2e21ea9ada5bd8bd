//! The cache service.
//!
//! [`CacheService`] owns the cache backend and the injected authoritative
//! repositories, and runs the full query pipeline: normalize → compile →
//! schema scope → tenancy guard → search injection → find/count → envelope.
//! Cache writes always re-fetch the authoritative record first, so an upsert
//! can never persist stale in-memory state. Warmup and cleanup are
//! maintenance operations that never run on the request path.

use std::collections::BTreeMap;
use std::sync::Arc;

use mongodb::bson::{Bson, Document, doc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::query::{
    apply_visibility, compile_filter, envelope, inject_search, normalize_query, page_window,
    scope::validate_order_fields, scope_to_schemas,
};
use crate::repository::{EndpointRepository, ObjectRepository, SchemaRepository, SourceObject};
use crate::store::{
    CacheBackend, CacheCollection, FindWindow, matches_filter, sort_documents,
};
use crate::tenant::TenancyContext;
use crate::types::document::{CachedEndpoint, CachedObject, CachedSchema};
use crate::types::filter::CompleteFilter;
use crate::types::result::{FacetBucket, PaginatedResult};

/// Outcome of a warmup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Objects written into the cache.
    pub objects: u64,
    /// Schemas written into the cache.
    pub schemas: u64,
    /// Endpoints written into the cache.
    pub endpoints: u64,
    /// Orphaned cache entries removed by the trailing cleanup.
    pub pruned: u64,
}

/// The object cache and query engine.
///
/// Holds one [`CacheBackend`] (shared, read-mostly) and the authoritative
/// repositories. Each request builds its own filter and envelope; the only
/// state shared across requests is the store connection itself.
pub struct CacheService {
    backend: CacheBackend,
    objects: Arc<dyn ObjectRepository>,
    schemas: Arc<dyn SchemaRepository>,
    endpoints: Arc<dyn EndpointRepository>,
    config: CacheConfig,
}

impl CacheService {
    /// Creates a service over the given backend and repositories.
    pub fn new(
        backend: CacheBackend,
        objects: Arc<dyn ObjectRepository>,
        schemas: Arc<dyn SchemaRepository>,
        endpoints: Arc<dyn EndpointRepository>,
        config: CacheConfig,
    ) -> Self {
        Self {
            backend,
            objects,
            schemas,
            endpoints,
            config,
        }
    }

    /// Returns the backend state.
    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    /// Runs a paginated object search.
    ///
    /// `raw` is the query-parameter map as handed over by the routing layer;
    /// `schema_scope` optionally narrows to schema ids or reference URIs. The
    /// same compiled filter drives the page fetch and the total count, so the
    /// envelope always agrees with the results.
    pub async fn search_objects(
        &self,
        ctx: &TenancyContext,
        raw: &Map<String, Value>,
        schema_scope: &[String],
    ) -> CacheResult<PaginatedResult> {
        let normalized = normalize_query(raw);
        let complete = CompleteFilter::from_normalized(&normalized);
        validate_order_fields(&complete.order)?;
        let filter = self.build_filter(ctx, &normalized, &complete, schema_scope).await?;

        let (limit, skip) = page_window(&complete, self.config.default_limit);
        let (documents, total) = match self.backend.store() {
            Some(store) => {
                let window = FindWindow {
                    limit: Some(limit),
                    skip: Some(skip),
                    sort: complete.sort_document(),
                };
                let documents = store
                    .find(CacheCollection::Objects, filter.clone(), window)
                    .await?;
                let total = store.count(CacheCollection::Objects, filter).await?;
                (documents, total)
            }
            None => self.find_fallback(&filter, &complete, limit, skip).await?,
        };

        let results: CacheResult<Vec<Value>> = documents
            .iter()
            .map(|document| Ok(serde_json::to_value(document)?))
            .collect();
        Ok(envelope(results?, total, &complete, self.config.default_limit))
    }

    /// Runs the `_queries` facet aggregation: one unwind + group-by + count
    /// pipeline per requested field, under the same compiled filter as a
    /// search. Returns an empty map in degraded mode.
    pub async fn facet_counts(
        &self,
        ctx: &TenancyContext,
        raw: &Map<String, Value>,
        schema_scope: &[String],
    ) -> CacheResult<BTreeMap<String, Vec<FacetBucket>>> {
        let normalized = normalize_query(raw);
        let complete = CompleteFilter::from_normalized(&normalized);
        let filter = self.build_filter(ctx, &normalized, &complete, schema_scope).await?;

        let Some(store) = self.backend.store() else {
            tracing::warn!("facet counts requested without a connected cache backend");
            return Ok(BTreeMap::new());
        };

        let mut facets = BTreeMap::new();
        for field in &complete.queries {
            let pipeline = vec![
                doc! { "$match": filter.clone() },
                doc! { "$unwind": format!("${field}") },
                doc! { "$group": { "_id": format!("${field}"), "count": { "$sum": 1 } } },
            ];
            let buckets = store
                .aggregate(CacheCollection::Objects, pipeline)
                .await?
                .iter()
                .map(bucket_from_group)
                .collect::<CacheResult<Vec<FacetBucket>>>()?;
            facets.insert(field.clone(), buckets);
        }
        Ok(facets)
    }

    /// Fetches one object by id.
    ///
    /// Tries the cache first; on a miss, or in degraded mode, reads from the
    /// authoritative store, re-applies the visibility rule in application
    /// code (the store bypassed the compiled tenancy filter), and
    /// opportunistically writes the result back into the cache.
    pub async fn get_object(
        &self,
        ctx: &TenancyContext,
        id: &str,
    ) -> CacheResult<Option<Value>> {
        if let Some(store) = self.backend.store() {
            let window = FindWindow {
                limit: Some(1),
                ..FindWindow::default()
            };
            let mut found = store
                .find(CacheCollection::Objects, doc! { "_id": id }, window)
                .await?;
            if let Some(document) = found.pop() {
                if !ctx.can_view_document(&document) {
                    return Ok(None);
                }
                return Ok(Some(serde_json::to_value(&document)?));
            }
        }

        let Some(source) = self.objects.get(id).await? else {
            return Ok(None);
        };
        if !ctx.can_view(&source) {
            return Ok(None);
        }
        let document = CachedObject::from_source(&source)?;
        if let Some(store) = self.backend.store() {
            tracing::debug!(id, "repopulating cache after miss");
            store
                .upsert(CacheCollection::Objects, id, document.clone())
                .await?;
        }
        Ok(Some(serde_json::to_value(&document)?))
    }

    /// Writes one object into the cache.
    ///
    /// Always re-fetches the authoritative record by id first; a record that
    /// no longer exists prunes any stale cache entry instead. Returns the
    /// cached document, or `None` when nothing was written.
    pub async fn cache_object(&self, id: &str) -> CacheResult<Option<Document>> {
        let Some(store) = self.backend.store() else {
            return Ok(None);
        };
        match self.objects.get(id).await? {
            Some(source) => {
                let document = CachedObject::from_source(&source)?;
                store
                    .upsert(CacheCollection::Objects, id, document.clone())
                    .await?;
                Ok(Some(document))
            }
            None => {
                store.delete(CacheCollection::Objects, id).await?;
                Ok(None)
            }
        }
    }

    /// Removes one object from the cache. A no-op in degraded mode.
    pub async fn remove_object(&self, id: &str) -> CacheResult<bool> {
        match self.backend.store() {
            Some(store) => store.delete(CacheCollection::Objects, id).await,
            None => Ok(false),
        }
    }

    /// Writes one endpoint into the cache, pruning on a missing record.
    pub async fn cache_endpoint(&self, id: &str) -> CacheResult<Option<Document>> {
        let Some(store) = self.backend.store() else {
            return Ok(None);
        };
        match self.endpoints.get(id).await? {
            Some(source) => {
                let document = CachedEndpoint::from_source(&source);
                store
                    .upsert(CacheCollection::Endpoints, id, document.clone())
                    .await?;
                Ok(Some(document))
            }
            None => {
                store.delete(CacheCollection::Endpoints, id).await?;
                Ok(None)
            }
        }
    }

    /// Removes one endpoint from the cache.
    pub async fn remove_endpoint(&self, id: &str) -> CacheResult<bool> {
        match self.backend.store() {
            Some(store) => store.delete(CacheCollection::Endpoints, id).await,
            None => Ok(false),
        }
    }

    /// Resolves a routing filter to at most one endpoint.
    ///
    /// Routing must be deterministic: more than one match is a hard
    /// [`AmbiguousResult`](crate::error::CacheError::AmbiguousResult) error.
    pub async fn get_endpoint(&self, filter: Document) -> CacheResult<Option<Value>> {
        let matched = match self.backend.store() {
            Some(store) => {
                let window = FindWindow {
                    limit: Some(2),
                    ..FindWindow::default()
                };
                store.find(CacheCollection::Endpoints, filter, window).await?
            }
            None => self
                .endpoints
                .list()
                .await?
                .iter()
                .map(CachedEndpoint::from_source)
                .filter(|document| matches_filter(document, &filter))
                .take(2)
                .collect(),
        };
        self.single(matched, CacheCollection::Endpoints)
    }

    /// Writes one schema into the cache, pruning on a missing record.
    pub async fn cache_schema(&self, id: Uuid) -> CacheResult<Option<Document>> {
        let Some(store) = self.backend.store() else {
            return Ok(None);
        };
        let key = id.to_string();
        match self.schemas.get_by_id(id).await? {
            Some(source) => {
                let document = CachedSchema::from_source(&source);
                store
                    .upsert(CacheCollection::Schemas, &key, document.clone())
                    .await?;
                Ok(Some(document))
            }
            None => {
                store.delete(CacheCollection::Schemas, &key).await?;
                Ok(None)
            }
        }
    }

    /// Removes one schema from the cache.
    pub async fn remove_schema(&self, id: Uuid) -> CacheResult<bool> {
        match self.backend.store() {
            Some(store) => store.delete(CacheCollection::Schemas, &id.to_string()).await,
            None => Ok(false),
        }
    }

    /// Resolves a filter to at most one cached schema.
    pub async fn get_schema(&self, filter: Document) -> CacheResult<Option<Value>> {
        let matched = match self.backend.store() {
            Some(store) => {
                let window = FindWindow {
                    limit: Some(2),
                    ..FindWindow::default()
                };
                store.find(CacheCollection::Schemas, filter, window).await?
            }
            None => self
                .schemas
                .list()
                .await?
                .iter()
                .map(CachedSchema::from_source)
                .filter(|document| matches_filter(document, &filter))
                .take(2)
                .collect(),
        };
        self.single(matched, CacheCollection::Schemas)
    }

    /// Re-populates the cache from the authoritative store.
    ///
    /// Upserts every object, schema, and endpoint, rebuilds the text indexes,
    /// then runs cleanup. Warmup runs before cleanup by design: a record
    /// created while warmup iterates is present authoritatively and will not
    /// be pruned. Expected to run single-instance; there is no distributed
    /// lock.
    pub async fn warmup(&self) -> CacheResult<WarmupReport> {
        let Some(store) = self.backend.store() else {
            tracing::warn!("warmup requested without a connected cache backend");
            return Ok(WarmupReport::default());
        };

        let mut report = WarmupReport::default();
        for source in self.objects.list().await? {
            let document = CachedObject::from_source(&source)?;
            store
                .upsert(CacheCollection::Objects, &source.id, document)
                .await?;
            report.objects += 1;
        }
        for source in self.schemas.list().await? {
            let key = source.id.to_string();
            store
                .upsert(CacheCollection::Schemas, &key, CachedSchema::from_source(&source))
                .await?;
            report.schemas += 1;
        }
        for source in self.endpoints.list().await? {
            store
                .upsert(
                    CacheCollection::Endpoints,
                    &source.id,
                    CachedEndpoint::from_source(&source),
                )
                .await?;
            report.endpoints += 1;
        }

        for collection in CacheCollection::all() {
            store.ensure_text_index(collection).await?;
        }

        report.pruned = self.cleanup().await?;
        tracing::info!(
            objects = report.objects,
            schemas = report.schemas,
            endpoints = report.endpoints,
            pruned = report.pruned,
            "cache warmup complete"
        );
        Ok(report)
    }

    /// Prunes cache entries whose authoritative record no longer exists.
    ///
    /// One authoritative lookup per cached document; acceptable because this
    /// is an out-of-band maintenance job, never on the request path.
    pub async fn cleanup(&self) -> CacheResult<u64> {
        let Some(store) = self.backend.store() else {
            return Ok(0);
        };
        let mut pruned = 0;

        for id in store.ids(CacheCollection::Objects).await? {
            if self.objects.get(&id).await?.is_none() {
                store.delete(CacheCollection::Objects, &id).await?;
                tracing::debug!(id, "pruned orphaned cached object");
                pruned += 1;
            }
        }
        for id in store.ids(CacheCollection::Schemas).await? {
            let exists = match Uuid::parse_str(&id) {
                Ok(uuid) => self.schemas.get_by_id(uuid).await?.is_some(),
                Err(_) => false,
            };
            if !exists {
                store.delete(CacheCollection::Schemas, &id).await?;
                pruned += 1;
            }
        }
        for id in store.ids(CacheCollection::Endpoints).await? {
            if self.endpoints.get(&id).await?.is_none() {
                store.delete(CacheCollection::Endpoints, &id).await?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Builds the full compiled filter for a request: operator compilation,
    /// schema scope, tenancy guard, search injection.
    async fn build_filter(
        &self,
        ctx: &TenancyContext,
        normalized: &Map<String, Value>,
        complete: &CompleteFilter,
        schema_scope: &[String],
    ) -> CacheResult<Document> {
        let mut filter = compile_filter(normalized)?;
        scope_to_schemas(&mut filter, schema_scope, self.schemas.as_ref()).await?;
        apply_visibility(&mut filter, ctx);
        inject_search(&mut filter, complete.search.as_ref());
        Ok(filter)
    }

    /// Degraded-mode search: list authoritative objects, serialize them into
    /// their cached shape, and evaluate the same compiled filter in
    /// application code, so results match what a warm cache would return.
    async fn find_fallback(
        &self,
        filter: &Document,
        complete: &CompleteFilter,
        limit: u64,
        skip: u64,
    ) -> CacheResult<(Vec<Document>, u64)> {
        let sources: Vec<SourceObject> = self.objects.list().await?;
        let mut documents = Vec::with_capacity(sources.len());
        for source in &sources {
            documents.push(CachedObject::from_source(source)?);
        }
        documents.retain(|document| matches_filter(document, filter));
        let total = documents.len() as u64;
        if let Some(sort) = complete.sort_document() {
            sort_documents(&mut documents, &sort);
        }
        let page: Vec<Document> = documents
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    fn single(
        &self,
        mut matched: Vec<Document>,
        collection: CacheCollection,
    ) -> CacheResult<Option<Value>> {
        // The lookup stops scanning once ambiguity is proven, so `matched`
        // is a lower bound on the true match count.
        if matched.len() > 1 {
            return Err(crate::error::CacheError::AmbiguousResult {
                collection: collection.name(),
                matched: matched.len(),
            });
        }
        match matched.pop() {
            Some(document) => Ok(Some(serde_json::to_value(&document)?)),
            None => Ok(None),
        }
    }
}

/// Converts one `$group` output document into a facet bucket.
///
/// The count accumulator may come back at any numeric width: MongoDB returns
/// `Int32` whenever the total fits, the in-memory store always `Int64`.
fn bucket_from_group(bucket: &Document) -> CacheResult<FacetBucket> {
    let value = bucket
        .get("_id")
        .map(serde_json::to_value)
        .transpose()?
        .unwrap_or(Value::Null);
    let count = match bucket.get("count") {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Double(n)) => *n as i64,
        _ => 0,
    };
    Ok(FacetBucket {
        value,
        count: count.max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bucket_count_accepts_narrow_integers() {
        let bucket = doc! { "_id": "red", "count": 2i32 };
        let parsed = bucket_from_group(&bucket).unwrap();
        assert_eq!(parsed.value, json!("red"));
        assert_eq!(parsed.count, 2);

        let bucket = doc! { "_id": "blue", "count": 3i64 };
        assert_eq!(bucket_from_group(&bucket).unwrap().count, 3);
    }

    #[test]
    fn test_bucket_with_null_key() {
        let bucket = doc! { "_id": Bson::Null, "count": 1i32 };
        let parsed = bucket_from_group(&bucket).unwrap();
        assert_eq!(parsed.value, Value::Null);
        assert_eq!(parsed.count, 1);
    }
}
