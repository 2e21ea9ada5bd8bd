//! MongoDB document store.

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::{Client, Collection, IndexModel};

use super::{CacheCollection, DocumentStore, FindWindow};
use crate::error::CacheResult;

/// The production cache store: one MongoDB database holding the `objects`,
/// `endpoints`, and `schemas` collections.
///
/// The underlying client is pooled and safe for concurrent use by independent
/// requests; this type performs no locking of its own. Concurrent writers to
/// the same id race on upsert with last-write-wins semantics.
#[derive(Debug, Clone)]
pub struct MongoStore {
    objects: Collection<Document>,
    endpoints: Collection<Document>,
    schemas: Collection<Document>,
}

impl MongoStore {
    /// Connects to the given URI and binds the cache collections.
    pub async fn connect(uri: &str, database: &str) -> CacheResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let database = client.database(database);
        Ok(Self {
            objects: database.collection(CacheCollection::Objects.name()),
            endpoints: database.collection(CacheCollection::Endpoints.name()),
            schemas: database.collection(CacheCollection::Schemas.name()),
        })
    }

    fn collection(&self, collection: CacheCollection) -> &Collection<Document> {
        match collection {
            CacheCollection::Objects => &self.objects,
            CacheCollection::Endpoints => &self.endpoints,
            CacheCollection::Schemas => &self.schemas,
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn store_name(&self) -> &'static str {
        "mongodb"
    }

    async fn find(
        &self,
        collection: CacheCollection,
        filter: Document,
        window: FindWindow,
    ) -> CacheResult<Vec<Document>> {
        let mut find = self.collection(collection).find(filter);
        if let Some(sort) = window.sort {
            find = find.sort(sort);
        }
        if let Some(skip) = window.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = window.limit {
            find = find.limit(limit as i64);
        }
        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, collection: CacheCollection, filter: Document) -> CacheResult<u64> {
        Ok(self.collection(collection).count_documents(filter).await?)
    }

    async fn aggregate(
        &self,
        collection: CacheCollection,
        pipeline: Vec<Document>,
    ) -> CacheResult<Vec<Document>> {
        let cursor = self.collection(collection).aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert(
        &self,
        collection: CacheCollection,
        id: &str,
        document: Document,
    ) -> CacheResult<()> {
        self.collection(collection)
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, collection: CacheCollection, id: &str) -> CacheResult<bool> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn ids(&self, collection: CacheCollection) -> CacheResult<Vec<String>> {
        let raw = self
            .collection(collection)
            .distinct("_id", Document::new())
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|value| value.as_str().map(String::from))
            .collect())
    }

    async fn ensure_text_index(&self, collection: CacheCollection) -> CacheResult<()> {
        // Wildcard text index over the whole document, so bare `_search`
        // terms hit every indexed string field without schema knowledge.
        let index = IndexModel::builder().keys(doc! { "$**": "text" }).build();
        self.collection(collection).create_index(index).await?;
        Ok(())
    }
}
