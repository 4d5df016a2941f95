//! In-memory storage implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;

use crate::error::StorageResult;
use crate::models::{ActivityCode, Company, Establishment, Partner};
use crate::traits::{capital_bound, criterion, Pagination, ProspectFilter, RegistryStore};

/// In-memory implementation of RegistryStore.
///
/// Uses DashMap for thread-safe concurrent access without locks. Filtered
/// searches scan every establishment, so this backend is meant for tests and
/// small fixtures.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    companies: DashMap<String, Company>,
    establishments: DashMap<i64, Establishment>,
    /// Partners grouped by company base-id, in insertion order.
    partners: DashMap<String, Vec<Partner>>,
    activity_codes: DashMap<String, ActivityCode>,
}

impl MemoryRegistryStore {
    /// Creates a new in-memory registry store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory registry store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Inserts or replaces a company.
    pub fn insert_company(&self, company: Company) {
        self.companies.insert(company.base_id.clone(), company);
    }

    /// Inserts or replaces an establishment.
    pub fn insert_establishment(&self, establishment: Establishment) {
        self.establishments.insert(establishment.id, establishment);
    }

    /// Appends a partner to its company's partner list.
    pub fn insert_partner(&self, partner: Partner) {
        self.partners
            .entry(partner.base_id.clone())
            .or_default()
            .push(partner);
    }

    /// Inserts or replaces an activity code.
    pub fn insert_activity_code(&self, activity: ActivityCode) {
        self.activity_codes.insert(activity.code.clone(), activity);
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Applies the filter to an establishment joined with its company.
fn matches(filter: &ProspectFilter, est: &Establishment, company: &Company) -> bool {
    if criterion(&filter.cnpj).is_some_and(|v| est.cnpj != v) {
        return false;
    }
    if criterion(&filter.trade_name).is_some_and(|v| !contains_ci(&est.trade_name, v)) {
        return false;
    }
    if criterion(&filter.state).is_some_and(|v| est.state != v) {
        return false;
    }
    if criterion(&filter.registration_status).is_some_and(|v| est.registration_status != v) {
        return false;
    }
    if criterion(&filter.primary_activity).is_some_and(|v| est.primary_activity != v) {
        return false;
    }
    if criterion(&filter.secondary_activity).is_some_and(|v| !est.secondary_activities.contains(v))
    {
        return false;
    }
    if criterion(&filter.legal_name).is_some_and(|v| !contains_ci(&company.legal_name, v)) {
        return false;
    }
    if criterion(&filter.company_size).is_some_and(|v| company.size != v) {
        return false;
    }
    if capital_bound(filter.min_share_capital).is_some_and(|min| company.share_capital < min) {
        return false;
    }
    if capital_bound(filter.max_share_capital).is_some_and(|max| company.share_capital > max) {
        return false;
    }
    if criterion(&filter.municipality).is_some_and(|v| !contains_ci(&est.municipality, v)) {
        return false;
    }
    if criterion(&filter.legal_nature).is_some_and(|v| company.legal_nature != v) {
        return false;
    }
    let date = est.registration_status_date.as_str();
    if criterion(&filter.registration_status_date_min).is_some_and(|v| date < v) {
        return false;
    }
    if criterion(&filter.registration_status_date_max).is_some_and(|v| date > v) {
        return false;
    }
    let started = est.activity_start.as_str();
    if criterion(&filter.activity_start_min).is_some_and(|v| started < v) {
        return false;
    }
    if criterion(&filter.activity_start_max).is_some_and(|v| started > v) {
        return false;
    }
    true
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    #[instrument(skip(self, base_ids), fields(keys = base_ids.len()))]
    async fn fetch_companies(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Company>> {
        Ok(base_ids
            .iter()
            .filter_map(|id| {
                self.companies
                    .get(id)
                    .map(|c| (id.clone(), c.value().clone()))
            })
            .collect())
    }

    #[instrument(skip(self, base_ids), fields(keys = base_ids.len()))]
    async fn fetch_partners(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Vec<Partner>>> {
        Ok(base_ids
            .iter()
            .filter_map(|id| {
                self.partners
                    .get(id)
                    .map(|p| (id.clone(), p.value().clone()))
            })
            .collect())
    }

    #[instrument(skip(self, codes), fields(keys = codes.len()))]
    async fn fetch_activity_codes(
        &self,
        codes: &[String],
    ) -> StorageResult<HashMap<String, ActivityCode>> {
        Ok(codes
            .iter()
            .filter_map(|code| {
                self.activity_codes
                    .get(code)
                    .map(|a| (code.clone(), a.value().clone()))
            })
            .collect())
    }

    async fn list_companies(&self, limit: Option<u32>) -> StorageResult<Vec<Company>> {
        let mut companies: Vec<Company> =
            self.companies.iter().map(|c| c.value().clone()).collect();
        companies.sort_by(|a, b| a.base_id.cmp(&b.base_id));
        if let Some(limit) = limit.filter(|l| *l > 0) {
            companies.truncate(limit as usize);
        }
        Ok(companies)
    }

    async fn get_company(&self, base_id: &str) -> StorageResult<Option<Company>> {
        Ok(self.companies.get(base_id).map(|c| c.value().clone()))
    }

    async fn get_establishment(&self, id: i64) -> StorageResult<Option<Establishment>> {
        Ok(self.establishments.get(&id).map(|e| e.value().clone()))
    }

    async fn get_establishment_by_base_id(
        &self,
        base_id: &str,
    ) -> StorageResult<Option<Establishment>> {
        // Head office ("1") first, then lowest id.
        let mut candidates: Vec<Establishment> = self
            .establishments
            .iter()
            .filter(|e| e.base_id == base_id)
            .map(|e| e.value().clone())
            .collect();
        candidates.sort_by(|a, b| {
            b.is_head_office()
                .cmp(&a.is_head_office())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(candidates.into_iter().next())
    }

    #[instrument(skip(self, filter))]
    async fn find_establishments(
        &self,
        filter: &ProspectFilter,
        pagination: &Pagination,
    ) -> StorageResult<Vec<Establishment>> {
        let mut matched: Vec<Establishment> = self
            .establishments
            .iter()
            .filter_map(|entry| {
                let est = entry.value();
                // Inner join: establishments without a company are never returned.
                let company = self.companies.get(&est.base_id)?;
                matches(filter, est, company.value()).then(|| est.clone())
            })
            .collect();
        matched.sort_by(|a, b| a.cnpj.cmp(&b.cnpj).then_with(|| a.id.cmp(&b.id)));

        let offset = pagination.effective_offset() as usize;
        let items = matched.into_iter().skip(offset);
        Ok(match pagination.effective_limit() {
            Some(limit) => items.take(limit as usize).collect(),
            None => items.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> MemoryRegistryStore {
        let store = MemoryRegistryStore::new();

        let mut acme = Company::new("11111111", "Acme Comercio Ltda");
        acme.size = "03".to_string();
        acme.share_capital = 50_000.0;
        store.insert_company(acme);

        let mut globex = Company::new("22222222", "Globex Servicos SA");
        globex.size = "05".to_string();
        globex.share_capital = 2_000_000.0;
        store.insert_company(globex);

        let mut head = Establishment::new(1, "11111111000191", "11111111");
        head.head_office_flag = "1".to_string();
        head.state = "SP".to_string();
        head.trade_name = "ACME".to_string();
        head.primary_activity = "4711302".to_string();
        head.secondary_activities = "6201501,6202300".to_string();
        store.insert_establishment(head);

        let mut branch = Establishment::new(2, "11111111000272", "11111111");
        branch.head_office_flag = "2".to_string();
        branch.state = "RJ".to_string();
        store.insert_establishment(branch);

        let mut globex_head = Establishment::new(3, "22222222000100", "22222222");
        globex_head.head_office_flag = "1".to_string();
        globex_head.state = "SP".to_string();
        globex_head.municipality = "SAO PAULO".to_string();
        store.insert_establishment(globex_head);

        // Orphan establishment: its company is missing.
        store.insert_establishment(Establishment::new(4, "33333333000100", "33333333"));

        store.insert_partner(Partner::new("11111111", "Maria Silva"));
        store.insert_partner(Partner::new("11111111", "Joao Souza"));
        store.insert_activity_code(ActivityCode::new("6201501", "Desenvolvimento de software"));

        store
    }

    #[tokio::test]
    async fn test_memory_store_can_be_created() {
        let store = MemoryRegistryStore::new();
        let companies = store.list_companies(None).await.unwrap();
        assert!(companies.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_shared() {
        let store = MemoryRegistryStore::new_shared();
        store.insert_company(Company::new("12345678", "Shared"));

        let store2 = Arc::clone(&store);
        let found = store2.get_company("12345678").await.unwrap();
        assert_eq!(found.unwrap().legal_name, "Shared");
    }

    #[tokio::test]
    async fn test_fetch_companies_omits_unknown_keys() {
        let store = seeded_store();
        let keys = vec!["11111111".to_string(), "99999999".to_string()];

        let found = store.fetch_companies(&keys).await.unwrap();

        assert_eq!(found.len(), 1);
        assert!(found.contains_key("11111111"));
        assert!(!found.contains_key("99999999"));
    }

    #[tokio::test]
    async fn test_fetch_partners_groups_by_base_id() {
        let store = seeded_store();
        let keys = vec!["11111111".to_string(), "22222222".to_string()];

        let grouped = store.fetch_partners(&keys).await.unwrap();

        assert_eq!(grouped.get("11111111").map(Vec::len), Some(2));
        assert!(!grouped.contains_key("22222222"));
    }

    #[tokio::test]
    async fn test_get_partners_defaults_to_empty() {
        let store = seeded_store();
        assert!(store.get_partners("22222222").await.unwrap().is_empty());
        assert_eq!(store.get_partners("11111111").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_activity_code() {
        let store = seeded_store();
        let found = store.get_activity_code("6201501").await.unwrap();
        assert_eq!(found.unwrap().description, "Desenvolvimento de software");
        assert!(store.get_activity_code("0000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_establishment_by_base_id_prefers_head_office() {
        let store = seeded_store();
        let est = store
            .get_establishment_by_base_id("11111111")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(est.id, 1);
        assert!(est.is_head_office());
    }

    #[tokio::test]
    async fn test_head_office_wins_over_lower_id_branch() {
        let store = MemoryRegistryStore::new();
        let mut branch = Establishment::new(5, "44444444000272", "44444444");
        branch.head_office_flag = "2".to_string();
        store.insert_establishment(branch);
        let mut head = Establishment::new(9, "44444444000191", "44444444");
        head.head_office_flag = "1".to_string();
        store.insert_establishment(head);

        // Flag "1" sorts first: a descending flag order would return the branch.
        let est = store
            .get_establishment_by_base_id("44444444")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(est.id, 9);

        let only_branches = MemoryRegistryStore::new();
        for id in [7, 6] {
            let mut est = Establishment::new(id, format!("55555555000{id}00"), "55555555");
            est.head_office_flag = "2".to_string();
            only_branches.insert_establishment(est);
        }
        let est = only_branches
            .get_establishment_by_base_id("55555555")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(est.id, 6);
    }

    #[tokio::test]
    async fn test_find_establishments_skips_orphans_and_orders_by_cnpj() {
        let store = seeded_store();

        let found = store
            .find_establishments(&ProspectFilter::default(), &Pagination::default())
            .await
            .unwrap();

        let ids: Vec<i64> = found.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_find_establishments_applies_filter() {
        let store = seeded_store();

        let filter = ProspectFilter {
            state: Some("SP".to_string()),
            min_share_capital: Some(1_000_000.0),
            ..Default::default()
        };
        let found = store
            .find_establishments(&filter, &Pagination::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 3);

        let filter = ProspectFilter {
            legal_name: Some("acme".to_string()),
            secondary_activity: Some("6202300".to_string()),
            ..Default::default()
        };
        let found = store
            .find_establishments(&filter, &Pagination::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
    }

    #[tokio::test]
    async fn test_find_establishments_ignores_blank_and_negative_criteria() {
        let store = seeded_store();
        let filter = ProspectFilter {
            state: Some("  ".to_string()),
            min_share_capital: Some(-5.0),
            ..Default::default()
        };
        let found = store
            .find_establishments(&filter, &Pagination::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn test_find_establishments_paginates() {
        let store = seeded_store();

        let page = Pagination::new(Some(2), Some(1));
        let found = store
            .find_establishments(&ProspectFilter::default(), &page)
            .await
            .unwrap();

        let ids: Vec<i64> = found.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_list_companies_respects_limit() {
        let store = seeded_store();
        assert_eq!(store.list_companies(None).await.unwrap().len(), 2);
        let limited = store.list_companies(Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].base_id, "11111111");
    }
}
