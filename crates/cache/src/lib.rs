//! Portico Gateway Object Cache
//!
//! This crate provides the gateway's read-side object cache: a denormalized
//! document mirror of the authoritative store, together with the query engine
//! that serves filtered, tenant-scoped, paginated searches from it.
//!
//! # Features
//!
//! - **Query compilation**: a query-string filter DSL (relational, date,
//!   pattern, set, negation, and element-match operators) compiled into
//!   document-store filter expressions
//! - **Tenancy**: ownership visibility injected into every compiled filter, so
//!   no search can widen past the requesting user
//! - **Search**: free-text search over the collection text index, plus
//!   per-field substring search
//! - **Pagination**: offset-authoritative page envelopes with stable
//!   `total`/`page`/`pages` bookkeeping
//! - **Degraded mode**: with no cache configured, reads fall back to the
//!   authoritative repositories and evaluate the same compiled filters in
//!   application code
//! - **Maintenance**: warmup rebuilds the full mirror, cleanup prunes entries
//!   whose authoritative record is gone
//!
//! # Architecture
//!
//! - [`config`] - Environment-driven configuration
//! - [`error`] - Error types for all operations
//! - [`query`] - The query compilation pipeline
//! - [`repository`] - Traits over the authoritative store
//! - [`service`] - The [`CacheService`] orchestrator
//! - [`store`] - Document store backends (MongoDB, in-memory)
//! - [`tenant`] - Tenancy context and visibility rules
//! - [`types`] - Cached document shapes, filters, result envelopes
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use portico_cache::{CacheBackend, CacheConfig, CacheService, TenancyContext};
//! # use portico_cache::repository::{EndpointRepository, ObjectRepository, SchemaRepository};
//! # async fn demo(
//! #     objects: Arc<dyn ObjectRepository>,
//! #     schemas: Arc<dyn SchemaRepository>,
//! #     endpoints: Arc<dyn EndpointRepository>,
//! # ) -> portico_cache::CacheResult<()> {
//! let config = CacheConfig::from_env();
//! let backend = CacheBackend::from_config(&config).await?;
//! let service = CacheService::new(backend, objects, schemas, endpoints, config);
//!
//! // ?age[>=]=18&_limit=10&_page=2
//! let mut raw = serde_json::Map::new();
//! raw.insert("age".into(), serde_json::json!({ ">=": "18" }));
//! raw.insert("_limit".into(), serde_json::json!("10"));
//! raw.insert("_page".into(), serde_json::json!("2"));
//!
//! let ctx = TenancyContext::for_user("alice");
//! let page = service.search_objects(&ctx, &raw, &[]).await?;
//! println!("{} of {} results", page.count, page.total);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod query;
pub mod repository;
pub mod service;
pub mod store;
pub mod tenant;
pub mod types;

// Re-export the primary API at the crate root.
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use service::{CacheService, WarmupReport};
pub use store::{CacheBackend, CacheCollection, DocumentStore, FindWindow};
pub use tenant::TenancyContext;
pub use types::{CompleteFilter, FacetBucket, PaginatedResult};
