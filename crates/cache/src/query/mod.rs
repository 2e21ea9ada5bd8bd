//! The query compilation pipeline.
//!
//! A raw query-parameter map flows through this module in a fixed order:
//! normalization, per-key operator compilation, schema scoping, the tenancy
//! guard, search injection, and finally pagination arithmetic. Each stage is a
//! pure function over the filter being built, so every stage is testable in
//! isolation.

pub mod compiler;
pub mod normalize;
pub mod pagination;
pub mod scope;
pub mod search;
pub mod tenancy;

pub use compiler::{compile_filter, compile_value};
pub use normalize::normalize_query;
pub use pagination::{envelope, page_window};
pub use scope::scope_to_schemas;
pub use search::inject_search;
pub use tenancy::apply_visibility;
