//! Pagination arithmetic.
//!
//! Forward direction: derive the store `limit`/`skip` window from the request
//! directives. Reverse direction: rebuild the envelope from the raw
//! directives plus the counts. The reported `page` is recomputed from the
//! offset rather than echoed back, so a request combining `_start` and
//! `_page` reports the page the offset actually lands on: the offset is
//! authoritative.

use serde_json::Value;

use crate::types::filter::CompleteFilter;
use crate::types::result::PaginatedResult;

/// Derives the store window (`limit`, `skip`) for a query.
///
/// `skip` comes from `_start`/`_offset` when either is present, else from
/// `_page`, else zero.
pub fn page_window(complete: &CompleteFilter, default_limit: u64) -> (u64, u64) {
    let limit = complete.limit.unwrap_or(default_limit).max(1);
    let skip = match complete.start.or(complete.offset) {
        Some(start) => start,
        None => complete.page.map(|page| (page.max(1) - 1) * limit).unwrap_or(0),
    };
    (limit, skip)
}

/// Builds the result envelope after the query has run.
pub fn envelope(
    results: Vec<Value>,
    total: u64,
    complete: &CompleteFilter,
    default_limit: u64,
) -> PaginatedResult {
    let limit = complete.limit.unwrap_or(default_limit).max(1);
    let start = complete.start.or(complete.offset).unwrap_or(0);
    let requested_page = complete.page.unwrap_or(1).max(1);

    let offset = if start > 1 {
        start - 1
    } else {
        (requested_page - 1) * limit
    };
    let pages = total.div_ceil(limit).max(1);
    let page = offset / limit + 1;

    PaginatedResult {
        count: results.len(),
        results,
        limit,
        total,
        offset,
        page,
        pages,
    }
}
