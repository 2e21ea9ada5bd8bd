//! Shared fixtures for the integration suite.
//!
//! `FixtureRepo` is a mutable in-memory authoritative store implementing all
//! three repository traits, so one `Arc` can back a whole `CacheService`.
//! Collections are ordered maps, keeping degraded-mode listings deterministic.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use portico_cache::error::CacheResult;
use portico_cache::repository::{
    EndpointRepository, ObjectRepository, SchemaRepository, SourceEndpoint, SourceObject,
    SourceSchema,
};
use portico_cache::{CacheBackend, CacheConfig, CacheService};
use serde_json::json;
use uuid::Uuid;

/// Reference URI of the fixture person schema.
pub const PERSON_SCHEMA_REF: &str = "https://portico.example/schemas/person";

/// Id of the fixture person schema.
pub fn person_schema_id() -> Uuid {
    Uuid::parse_str("3d1f4a9e-7b2c-4e8d-9f10-6a5b4c3d2e1f").unwrap()
}

/// In-memory authoritative store backing all three repository traits.
#[derive(Default)]
pub struct FixtureRepo {
    pub objects: RwLock<BTreeMap<String, SourceObject>>,
    pub schemas: RwLock<BTreeMap<Uuid, SourceSchema>>,
    pub endpoints: RwLock<BTreeMap<String, SourceEndpoint>>,
}

impl FixtureRepo {
    pub fn new() -> Arc<Self> {
        let repo = Self::default();
        repo.schemas.write().insert(
            person_schema_id(),
            SourceSchema {
                id: person_schema_id(),
                reference: PERSON_SCHEMA_REF.to_string(),
                name: "person".to_string(),
            },
        );
        Arc::new(repo)
    }

    pub fn insert_object(&self, object: SourceObject) {
        self.objects.write().insert(object.id.clone(), object);
    }

    pub fn remove_object(&self, id: &str) {
        self.objects.write().remove(id);
    }

    pub fn insert_endpoint(&self, endpoint: SourceEndpoint) {
        self.endpoints.write().insert(endpoint.id.clone(), endpoint);
    }

    pub fn remove_endpoint(&self, id: &str) {
        self.endpoints.write().remove(id);
    }
}

#[async_trait]
impl ObjectRepository for FixtureRepo {
    async fn get(&self, id: &str) -> CacheResult<Option<SourceObject>> {
        Ok(self.objects.read().get(id).cloned())
    }

    async fn list(&self) -> CacheResult<Vec<SourceObject>> {
        Ok(self.objects.read().values().cloned().collect())
    }
}

#[async_trait]
impl SchemaRepository for FixtureRepo {
    async fn get_by_id(&self, id: Uuid) -> CacheResult<Option<SourceSchema>> {
        Ok(self.schemas.read().get(&id).cloned())
    }

    async fn get_by_reference(&self, reference: &str) -> CacheResult<Option<SourceSchema>> {
        Ok(self
            .schemas
            .read()
            .values()
            .find(|schema| schema.reference == reference)
            .cloned())
    }

    async fn list(&self) -> CacheResult<Vec<SourceSchema>> {
        Ok(self.schemas.read().values().cloned().collect())
    }
}

#[async_trait]
impl EndpointRepository for FixtureRepo {
    async fn get(&self, id: &str) -> CacheResult<Option<SourceEndpoint>> {
        Ok(self.endpoints.read().get(id).cloned())
    }

    async fn list(&self) -> CacheResult<Vec<SourceEndpoint>> {
        Ok(self.endpoints.read().values().cloned().collect())
    }
}

/// Builds a person object with the fixture schema.
pub fn person(id: &str, name: &str, age: i64, owner: Option<&str>) -> SourceObject {
    let mut attributes = serde_json::Map::new();
    attributes.insert("name".to_string(), json!(name));
    attributes.insert("age".to_string(), json!(age));

    SourceObject {
        id: id.to_string(),
        schema_id: person_schema_id(),
        schema_ref: PERSON_SCHEMA_REF.to_string(),
        owner_id: owner.map(String::from),
        organization_id: None,
        attributes,
        embedded: BTreeMap::new(),
    }
}

/// Builds a routing endpoint fixture.
pub fn endpoint(id: &str, segments: &[&str], methods: &[&str]) -> SourceEndpoint {
    SourceEndpoint {
        id: id.to_string(),
        path: segments.iter().map(|s| s.to_string()).collect(),
        path_regex: None,
        methods: methods.iter().map(|m| m.to_string()).collect(),
    }
}

/// Assembles a service over the given backend and a shared fixture repo.
pub fn service(backend: CacheBackend, repo: Arc<FixtureRepo>) -> CacheService {
    CacheService::new(
        backend,
        repo.clone(),
        repo.clone(),
        repo,
        CacheConfig::default(),
    )
}

/// Seeds `count` persons with ages `1..=count`, all owned by `owner`.
pub fn seed_people(repo: &FixtureRepo, count: i64, owner: &str) {
    for age in 1..=count {
        repo.insert_object(person(
            &format!("p{age:03}"),
            &format!("Person {age}"),
            age,
            Some(owner),
        ));
    }
}
