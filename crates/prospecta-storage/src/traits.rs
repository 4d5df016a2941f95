//! RegistryStore trait definition.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::models::{ActivityCode, Company, Establishment, Partner};

/// Filter for prospect searches over establishments joined with their company.
///
/// Every field is optional; `None` (or an empty string) leaves that column
/// unconstrained. How each predicate is applied is up to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProspectFilter {
    /// Exact raw CNPJ.
    pub cnpj: Option<String>,
    /// Case-insensitive substring of the company legal name.
    pub legal_name: Option<String>,
    /// Case-insensitive substring of the establishment trade name.
    pub trade_name: Option<String>,
    /// Exact state (UF).
    pub state: Option<String>,
    pub registration_status: Option<String>,
    pub company_size: Option<String>,
    pub primary_activity: Option<String>,
    /// Substring of the comma-delimited secondary activity list.
    pub secondary_activity: Option<String>,
    /// Inclusive lower bound on share capital; negative values are ignored.
    pub min_share_capital: Option<f64>,
    /// Inclusive upper bound on share capital; negative values are ignored.
    pub max_share_capital: Option<f64>,
    /// Case-insensitive substring of the municipality.
    pub municipality: Option<String>,
    pub legal_nature: Option<String>,
    pub registration_status_date_min: Option<String>,
    pub registration_status_date_max: Option<String>,
    pub activity_start_min: Option<String>,
    pub activity_start_max: Option<String>,
}

/// Returns the trimmed value of a text criterion, or `None` when unset or blank.
pub fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Returns a capital bound when set and non-negative.
pub fn capital_bound(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v >= 0.0)
}

/// Limit/offset pagination for filtered searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum rows to return; `None` or zero means unbounded.
    pub limit: Option<u32>,
    /// Rows to skip before the first returned row.
    pub offset: Option<u32>,
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self { limit, offset }
    }

    /// The effective limit, treating zero as unbounded.
    pub fn effective_limit(&self) -> Option<u32> {
        self.limit.filter(|l| *l > 0)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// Abstract storage interface for company-registry data.
///
/// The `fetch_*` operations are the bulk lookups consumed by the batching
/// loaders: callers pass already-deduplicated keys, and keys with no match
/// are simply absent from the returned map.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait RegistryStore: Send + Sync + 'static {
    // Bulk operations

    /// Fetches companies by base-id.
    async fn fetch_companies(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Company>>;

    /// Fetches partners grouped by company base-id.
    async fn fetch_partners(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Vec<Partner>>>;

    /// Fetches activity codes by code.
    async fn fetch_activity_codes(
        &self,
        codes: &[String],
    ) -> StorageResult<HashMap<String, ActivityCode>>;

    // Direct lookups

    /// Lists companies, optionally limited.
    async fn list_companies(&self, limit: Option<u32>) -> StorageResult<Vec<Company>>;

    /// Gets a company by base-id.
    async fn get_company(&self, base_id: &str) -> StorageResult<Option<Company>>;

    /// Gets an establishment by its numeric id.
    async fn get_establishment(&self, id: i64) -> StorageResult<Option<Establishment>>;

    /// Gets one establishment of a company, preferring the head office.
    async fn get_establishment_by_base_id(
        &self,
        base_id: &str,
    ) -> StorageResult<Option<Establishment>>;

    /// Finds establishments matching the filter, ordered by CNPJ.
    async fn find_establishments(
        &self,
        filter: &ProspectFilter,
        pagination: &Pagination,
    ) -> StorageResult<Vec<Establishment>>;

    /// Lists the partners of one company.
    async fn get_partners(&self, base_id: &str) -> StorageResult<Vec<Partner>> {
        let keys = [base_id.to_string()];
        let mut grouped = self.fetch_partners(&keys).await?;
        Ok(grouped.remove(base_id).unwrap_or_default())
    }

    /// Gets one activity code.
    async fn get_activity_code(&self, code: &str) -> StorageResult<Option<ActivityCode>> {
        let keys = [code.to_string()];
        let mut found = self.fetch_activity_codes(&keys).await?;
        Ok(found.remove(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criterion_ignores_blank_values() {
        assert_eq!(criterion(&None), None);
        assert_eq!(criterion(&Some(String::new())), None);
        assert_eq!(criterion(&Some("   ".to_string())), None);
        assert_eq!(criterion(&Some(" SP ".to_string())), Some("SP"));
    }

    #[test]
    fn test_capital_bound_ignores_negative_values() {
        assert_eq!(capital_bound(Some(-1.0)), None);
        assert_eq!(capital_bound(Some(0.0)), Some(0.0));
        assert_eq!(capital_bound(None), None);
    }

    #[test]
    fn test_pagination_zero_limit_is_unbounded() {
        let page = Pagination::new(Some(0), None);
        assert_eq!(page.effective_limit(), None);
        assert_eq!(page.effective_offset(), 0);

        let page = Pagination::new(Some(10), Some(20));
        assert_eq!(page.effective_limit(), Some(10));
        assert_eq!(page.effective_offset(), 20);
    }
}
