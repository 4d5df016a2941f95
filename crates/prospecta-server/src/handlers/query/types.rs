//! Error types for query operations.

use prospecta_domain::{DomainError, LoadError};

/// Errors returned by query operations, tagged with the failing operation.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {source}")]
pub struct QueryError {
    /// Name of the query operation.
    pub operation: &'static str,
    /// Underlying domain error.
    #[source]
    pub source: DomainError,
}

impl QueryError {
    pub fn new(operation: &'static str, source: impl Into<DomainError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    /// Whether the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.source,
            DomainError::NotFound { .. } | DomainError::Load(LoadError::NotFound { .. })
        )
    }

    /// Whether the caller supplied a malformed key.
    pub fn is_malformed_key(&self) -> bool {
        matches!(self.source, DomainError::MalformedKey { .. })
    }

    /// Whether the store failed while serving the query.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self.source,
            DomainError::Storage(_) | DomainError::Load(LoadError::StoreFailure(_))
        )
    }
}

/// Returns a closure tagging an error with the operation name, for `map_err`.
pub(crate) fn failed<E>(operation: &'static str) -> impl FnOnce(E) -> QueryError
where
    E: Into<DomainError>,
{
    move |err| QueryError::new(operation, err)
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use prospecta_storage::StorageError;

    #[test]
    fn test_error_message_includes_operation() {
        let err = QueryError::new(
            "company",
            DomainError::NotFound {
                entity: "company",
                key: "11111111".to_string(),
            },
        );
        assert_eq!(err.to_string(), "company failed: company not found: 11111111");
        assert!(err.is_not_found());
        assert!(!err.is_store_failure());
    }

    #[test]
    fn test_load_errors_are_classified() {
        let err = QueryError::new(
            "activity_code_by_code",
            LoadError::NotFound {
                what: "activity code 1".to_string(),
            },
        );
        assert!(err.is_not_found());

        let err = QueryError::new(
            "companies",
            StorageError::QueryError {
                message: "down".to_string(),
            },
        );
        assert!(err.is_store_failure());
    }
}
