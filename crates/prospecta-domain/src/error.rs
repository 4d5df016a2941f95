//! Domain error types for batched loading and record aggregation.

use std::sync::Arc;

use prospecta_storage::StorageError;
use thiserror::Error;

/// Outcome of a single keyed load.
///
/// Cloneable because one resolved slot is observed by every waiter of the
/// key, and stays cached for the rest of the request.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The key has no value and the loader's absence policy treats that as an error.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The store call backing this load's batch failed.
    #[error("store failure: {0}")]
    StoreFailure(#[source] Arc<StorageError>),

    /// The loader was dropped before the load's batch was flushed.
    #[error("load cancelled before its batch was flushed")]
    Cancelled,
}

/// Result type for a single keyed load.
pub type LoadResult<T> = Result<T, LoadError>;

/// Domain-specific errors.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A batched load failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A direct storage call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Key was rejected before any load was issued.
    #[error("malformed key '{value}': {reason}")]
    MalformedKey { value: String, reason: String },

    /// The request context carries no loader registry.
    #[error("no loader registry attached to request {request_id}")]
    ContextMissing { request_id: String },

    /// Entity not found by a direct lookup.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_is_shared_between_clones() {
        let err = LoadError::StoreFailure(Arc::new(StorageError::QueryError {
            message: "boom".to_string(),
        }));
        let cloned = err.clone();

        match (err, cloned) {
            (LoadError::StoreFailure(a), LoadError::StoreFailure(b)) => {
                assert!(Arc::ptr_eq(&a, &b));
            }
            _ => panic!("expected store failures"),
        }
    }

    #[test]
    fn test_load_error_converts_into_domain_error() {
        let err: DomainError = LoadError::NotFound {
            what: "activity code 6201501".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "not found: activity code 6201501");
    }
}
