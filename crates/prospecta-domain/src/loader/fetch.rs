//! Store adapters used by the batching loaders.
//!
//! Each adapter turns one bulk `RegistryStore` call into the keyed lookup a
//! loader needs, and decides what a key with no stored value resolves to.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use prospecta_storage::{ActivityCode, Company, Partner, RegistryStore, StorageResult};

use crate::error::{LoadError, LoadResult};

/// Bulk fetch strategy for one entity type.
#[async_trait]
pub trait BatchFetch: Send + Sync + 'static {
    /// Lookup key.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    /// Value a key resolves to.
    type Value: Clone + Send + Sync + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetches the values for a batch of distinct keys.
    ///
    /// Keys without a stored value are left out of the returned map.
    async fn fetch_many(
        &self,
        keys: &[Self::Key],
    ) -> StorageResult<HashMap<Self::Key, Self::Value>>;

    /// Resolution for a key that `fetch_many` did not return.
    fn on_missing(&self, key: &Self::Key) -> LoadResult<Self::Value>;
}

/// Loads companies by base-id. A missing company is an error.
pub struct CompanyFetcher<S> {
    store: Arc<S>,
}

impl<S> CompanyFetcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: RegistryStore> BatchFetch for CompanyFetcher<S> {
    type Key = String;
    type Value = Company;

    fn name(&self) -> &'static str {
        "companies"
    }

    async fn fetch_many(&self, keys: &[String]) -> StorageResult<HashMap<String, Company>> {
        self.store.fetch_companies(keys).await
    }

    fn on_missing(&self, key: &String) -> LoadResult<Company> {
        Err(LoadError::NotFound {
            what: format!("company with base-id {key}"),
        })
    }
}

/// Loads partner lists by company base-id. A company without partners has
/// an empty list.
pub struct PartnersFetcher<S> {
    store: Arc<S>,
}

impl<S> PartnersFetcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: RegistryStore> BatchFetch for PartnersFetcher<S> {
    type Key = String;
    type Value = Vec<Partner>;

    fn name(&self) -> &'static str {
        "partners"
    }

    async fn fetch_many(&self, keys: &[String]) -> StorageResult<HashMap<String, Vec<Partner>>> {
        self.store.fetch_partners(keys).await
    }

    fn on_missing(&self, _key: &String) -> LoadResult<Vec<Partner>> {
        Ok(Vec::new())
    }
}

/// Loads activity codes by code. A missing code is an error.
pub struct ActivityCodeFetcher<S> {
    store: Arc<S>,
}

impl<S> ActivityCodeFetcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: RegistryStore> BatchFetch for ActivityCodeFetcher<S> {
    type Key = String;
    type Value = ActivityCode;

    fn name(&self) -> &'static str {
        "activity_codes"
    }

    async fn fetch_many(&self, keys: &[String]) -> StorageResult<HashMap<String, ActivityCode>> {
        self.store.fetch_activity_codes(keys).await
    }

    fn on_missing(&self, key: &String) -> LoadResult<ActivityCode> {
        Err(LoadError::NotFound {
            what: format!("activity code {key}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospecta_storage::MemoryRegistryStore;

    #[test]
    fn test_absence_policies() {
        let store = MemoryRegistryStore::new_shared();
        let key = "12345678".to_string();

        let err = CompanyFetcher::new(Arc::clone(&store))
            .on_missing(&key)
            .unwrap_err();
        assert_eq!(err.to_string(), "not found: company with base-id 12345678");

        let partners = PartnersFetcher::new(Arc::clone(&store))
            .on_missing(&key)
            .unwrap();
        assert!(partners.is_empty());

        let err = ActivityCodeFetcher::new(store)
            .on_missing(&"62.01".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "not found: activity code 62.01");
    }

    #[tokio::test]
    async fn test_fetchers_delegate_to_store() {
        let store = MemoryRegistryStore::new_shared();
        store.insert_company(Company::new("12345678", "Acme"));
        store.insert_activity_code(ActivityCode::new("6201501", "Software"));

        let companies = CompanyFetcher::new(Arc::clone(&store))
            .fetch_many(&["12345678".to_string(), "87654321".to_string()])
            .await
            .unwrap();
        assert_eq!(companies.len(), 1);

        let codes = ActivityCodeFetcher::new(store)
            .fetch_many(&["6201501".to_string()])
            .await
            .unwrap();
        assert_eq!(codes["6201501"].description, "Software");
    }
}
