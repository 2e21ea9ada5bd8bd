//! Core types for cached documents, filters, and result envelopes.

pub mod document;
pub mod filter;
pub mod result;

pub use document::{CachedEndpoint, CachedObject, CachedSchema};
pub use filter::{CompleteFilter, FilterValue, RangeOp, SearchDirective, SortDirection};
pub use result::{FacetBucket, PaginatedResult};
