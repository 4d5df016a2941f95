//! Per-request loader registry.
//!
//! A registry holds one fresh loader per entity type. It is created when a
//! request starts and dropped when it ends, so caches are never shared
//! between requests.

mod context;

use std::sync::Arc;

use prospecta_storage::RegistryStore;

use crate::loader::{
    ActivityCodeFetcher, BatchLoader, CompanyFetcher, LoaderConfig, LoaderStats, PartnersFetcher,
};

pub use context::RequestContext;

/// Loader for companies keyed by base-id.
pub type CompanyLoader<S> = BatchLoader<CompanyFetcher<S>>;
/// Loader for partner lists keyed by company base-id.
pub type PartnersLoader<S> = BatchLoader<PartnersFetcher<S>>;
/// Loader for activity codes keyed by code.
pub type ActivityCodeLoader<S> = BatchLoader<ActivityCodeFetcher<S>>;

/// The loaders available to one request.
pub struct LoaderRegistry<S: RegistryStore> {
    companies: CompanyLoader<S>,
    partners: PartnersLoader<S>,
    activity_codes: ActivityCodeLoader<S>,
}

impl<S: RegistryStore> LoaderRegistry<S> {
    /// Builds a registry with empty caches over the given store.
    pub fn new(store: Arc<S>, config: LoaderConfig) -> Self {
        Self {
            companies: BatchLoader::new(CompanyFetcher::new(Arc::clone(&store)), config),
            partners: BatchLoader::new(PartnersFetcher::new(Arc::clone(&store)), config),
            activity_codes: BatchLoader::new(ActivityCodeFetcher::new(store), config),
        }
    }

    pub fn companies(&self) -> &CompanyLoader<S> {
        &self.companies
    }

    pub fn partners(&self) -> &PartnersLoader<S> {
        &self.partners
    }

    pub fn activity_codes(&self) -> &ActivityCodeLoader<S> {
        &self.activity_codes
    }

    /// Returns per-loader statistics as (name, stats) pairs.
    pub fn stats(&self) -> [(&'static str, LoaderStats); 3] {
        [
            ("companies", self.companies.stats()),
            ("partners", self.partners.stats()),
            ("activity_codes", self.activity_codes.stats()),
        ]
    }
}

impl<S: RegistryStore> std::fmt::Debug for LoaderRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("companies", &self.companies)
            .field("partners", &self.partners)
            .field("activity_codes", &self.activity_codes)
            .finish()
    }
}
