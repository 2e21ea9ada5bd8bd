//! Paginated result envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope returned by every paginated search.
///
/// Invariants: `count == results.len() <= limit`; `pages == ceil(total /
/// limit)` with a floor of 1; `page == offset / limit + 1`. The reported
/// `page` is recomputed from the authoritative offset rather than echoed back
/// from the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult {
    /// The documents on this page.
    pub results: Vec<Value>,
    /// Number of documents on this page.
    pub count: usize,
    /// Effective page size.
    pub limit: u64,
    /// Pre-limit match count.
    pub total: u64,
    /// Row offset of this page.
    pub offset: u64,
    /// 1-based page number, derived from `offset`.
    pub page: u64,
    /// Total number of pages, never less than 1.
    pub pages: u64,
}

impl PaginatedResult {
    /// An empty envelope for a query matching nothing.
    pub fn empty(limit: u64) -> Self {
        Self {
            results: Vec::new(),
            count: 0,
            limit,
            total: 0,
            offset: 0,
            page: 1,
            pages: 1,
        }
    }
}

/// One bucket of a `_queries` facet count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FacetBucket {
    /// The grouped field value.
    pub value: Value,
    /// Number of matching documents carrying that value.
    pub count: u64,
}
