//! Mock store for loader and pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prospecta_storage::{
    ActivityCode, Company, Establishment, MemoryRegistryStore, Pagination, Partner,
    ProspectFilter, RegistryStore, StorageError, StorageResult,
};

/// Which bulk operation a recorded call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Companies,
    Partners,
    ActivityCodes,
}

/// Registry store that records every bulk call and can be told to fail.
///
/// Backed by a `MemoryRegistryStore` for the actual data.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryRegistryStore,
    calls: Mutex<Vec<(FetchKind, Vec<String>)>>,
    failing_companies: AtomicU32,
    failing_partners: AtomicU32,
    failing_activity_codes: AtomicU32,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn data(&self) -> &MemoryRegistryStore {
        &self.inner
    }

    /// Makes the next `times` calls of the given kind fail.
    pub fn fail_next(&self, kind: FetchKind, times: u32) {
        self.failures(kind).store(times, Ordering::SeqCst);
    }

    /// Every key batch sent to the given operation, in call order.
    pub fn calls(&self, kind: FetchKind) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, keys)| keys.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn failures(&self, kind: FetchKind) -> &AtomicU32 {
        match kind {
            FetchKind::Companies => &self.failing_companies,
            FetchKind::Partners => &self.failing_partners,
            FetchKind::ActivityCodes => &self.failing_activity_codes,
        }
    }

    fn record(&self, kind: FetchKind, keys: &[String]) -> StorageResult<()> {
        self.calls.lock().unwrap().push((kind, keys.to_vec()));
        let failures = self.failures(kind);
        let remaining = failures.load(Ordering::SeqCst);
        if remaining > 0 {
            failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::QueryError {
                message: format!("injected {kind:?} failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for CountingStore {
    async fn fetch_companies(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Company>> {
        self.record(FetchKind::Companies, base_ids)?;
        self.inner.fetch_companies(base_ids).await
    }

    async fn fetch_partners(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Vec<Partner>>> {
        self.record(FetchKind::Partners, base_ids)?;
        self.inner.fetch_partners(base_ids).await
    }

    async fn fetch_activity_codes(
        &self,
        codes: &[String],
    ) -> StorageResult<HashMap<String, ActivityCode>> {
        self.record(FetchKind::ActivityCodes, codes)?;
        self.inner.fetch_activity_codes(codes).await
    }

    async fn list_companies(&self, limit: Option<u32>) -> StorageResult<Vec<Company>> {
        self.inner.list_companies(limit).await
    }

    async fn get_company(&self, base_id: &str) -> StorageResult<Option<Company>> {
        self.inner.get_company(base_id).await
    }

    async fn get_establishment(&self, id: i64) -> StorageResult<Option<Establishment>> {
        self.inner.get_establishment(id).await
    }

    async fn get_establishment_by_base_id(
        &self,
        base_id: &str,
    ) -> StorageResult<Option<Establishment>> {
        self.inner.get_establishment_by_base_id(base_id).await
    }

    async fn find_establishments(
        &self,
        filter: &ProspectFilter,
        pagination: &Pagination,
    ) -> StorageResult<Vec<Establishment>> {
        self.inner.find_establishments(filter, pagination).await
    }
}

/// Store with two companies, partners for the first, and two activity codes.
pub fn seeded_store() -> Arc<CountingStore> {
    let store = CountingStore::new();
    let data = store.data();

    data.insert_company(Company::new("11111111", "Acme Comercio Ltda"));
    data.insert_company(Company::new("22222222", "Globex Servicos SA"));
    data.insert_company(Company::new("001", "Initech"));

    data.insert_partner(Partner::new("11111111", "Maria Silva"));
    data.insert_partner(Partner::new("11111111", "Joao Souza"));

    data.insert_activity_code(ActivityCode::new("6201501", "Desenvolvimento de software"));
    data.insert_activity_code(ActivityCode::new("6202300", "Licenciamento de software"));
    data.insert_activity_code(ActivityCode::new("62.01", "Consultoria em TI"));

    store
}

/// Establishment root for pipeline tests.
pub fn establishment(id: i64, base_id: &str, primary: &str, secondary: &str) -> Establishment {
    let mut est = Establishment::new(id, format!("{base_id:0>8}{id:0>6}"), base_id);
    est.primary_activity = primary.to_string();
    est.secondary_activities = secondary.to_string();
    est
}
