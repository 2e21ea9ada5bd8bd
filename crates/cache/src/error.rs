//! Error types for the object cache and query engine.
//!
//! This module defines all error types used throughout the crate, following a
//! hierarchy that separates resolution errors, filter compilation errors, and
//! backend errors. Cache-backend absence is deliberately *not* an error: it is
//! a permanent mode modeled by [`CacheBackend::Disabled`](crate::store::CacheBackend).

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all cache and query operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A referenced schema or record could not be resolved.
    ///
    /// Resolution errors are normally recovered locally (logged, the offending
    /// clause skipped); they only surface from operations where the missing
    /// record is the whole point of the call.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A filter value could not be compiled into a store expression.
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// Document-store or authoritative-store failures.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// More than one cached document matched a filter that must be
    /// deterministic (endpoint routing). Always a hard failure. Lookups stop
    /// scanning once ambiguity is proven, so `matched` is a lower bound.
    #[error("ambiguous result: at least {matched} documents in '{collection}' matched a filter expected to match at most one")]
    AmbiguousResult {
        collection: &'static str,
        matched: usize,
    },
}

/// Errors raised while resolving schema references against the authoritative store.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// No schema exists with the given id.
    #[error("schema not found by id: {id}")]
    SchemaIdNotFound { id: Uuid },

    /// No schema exists with the given reference URI.
    #[error("schema not found by reference: {reference}")]
    SchemaRefNotFound { reference: String },
}

/// Errors raised while compiling a raw filter value into a store expression.
#[derive(Error, Debug)]
pub enum CompilationError {
    /// A date bound could not be parsed. Propagated to the caller rather than
    /// silently dropping the clause.
    #[error("invalid date '{value}' for filter '{field}'")]
    InvalidDate {
        field: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A relational or `int_compare` operand was not an integer.
    #[error("expected an integer for operator '{operator}' on '{field}', got '{value}'")]
    InvalidInteger {
        field: String,
        operator: String,
        value: String,
    },

    /// A `bool_compare` operand was not a boolean.
    #[error("expected a boolean for filter '{field}', got '{value}'")]
    InvalidBoolean { field: String, value: String },

    /// The filter value carried an operator keyword this engine does not know.
    #[error("unrecognized filter operator '{operator}' on '{field}'")]
    UnknownOperator { field: String, operator: String },
}

/// Errors originating from the document store or the authoritative store.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The requested operation needs a connected cache backend.
    #[error("cache backend unavailable: {message}")]
    Unavailable { message: String },

    /// Query execution failed.
    #[error("query execution failed: {message}")]
    Query { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// The authoritative store reported a failure.
    #[error("authoritative store error: {message}")]
    Source { message: String },

    /// Internal store error.
    #[error("internal error in {store}: {message}")]
    Internal {
        store: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for cache and query operations.
pub type CacheResult<T> = Result<T, CacheError>;

// Implement conversions from common error types

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Backend(BackendError::Serialization {
            message: err.to_string(),
        })
    }
}

impl From<mongodb::bson::ser::Error> for CacheError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        CacheError::Backend(BackendError::Serialization {
            message: err.to_string(),
        })
    }
}

impl From<mongodb::bson::de::Error> for CacheError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        CacheError::Backend(BackendError::Serialization {
            message: err.to_string(),
        })
    }
}

impl From<mongodb::error::Error> for CacheError {
    fn from(err: mongodb::error::Error) -> Self {
        CacheError::Backend(BackendError::Internal {
            store: "mongodb",
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError::SchemaRefNotFound {
            reference: "https://example.org/schema/person".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "schema not found by reference: https://example.org/schema/person"
        );
    }

    #[test]
    fn test_compilation_error_display() {
        let err = CompilationError::InvalidInteger {
            field: "age".to_string(),
            operator: ">=".to_string(),
            value: "eighteen".to_string(),
        };
        assert!(err.to_string().contains("expected an integer"));
    }

    #[test]
    fn test_ambiguous_result_display() {
        let err = CacheError::AmbiguousResult {
            collection: "endpoints",
            matched: 2,
        };
        assert!(err.to_string().contains("ambiguous result: at least 2"));
        assert!(err.to_string().contains("endpoints"));
    }

    #[test]
    fn test_cache_error_from_categories() {
        let err: CacheError = ResolutionError::SchemaIdNotFound {
            id: Uuid::nil(),
        }
        .into();
        assert!(matches!(err, CacheError::Resolution(_)));

        let err: CacheError = BackendError::Unavailable {
            message: "no cache url configured".to_string(),
        }
        .into();
        assert!(matches!(err, CacheError::Backend(_)));
    }
}
