//! Query handler implementation.

use std::sync::Arc;

use prospecta_domain::validation::{validate_activity_code, validate_base_id};
use prospecta_domain::{
    assemble, DomainError, LoaderConfig, LoaderRegistry, ProspectBatch, ProspectRecord,
    RequestContext,
};
use prospecta_storage::{
    ActivityCode, Company, Establishment, Pagination, Partner, ProspectFilter, RegistryStore,
    StorageResult,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::types::{failed, QueryError, QueryResult};
use crate::backend::RegistryBackend;
use crate::config::ServerConfig;

/// Handler for registry queries.
///
/// Direct lookups go straight to the store. Relation lookups and prospect
/// searches go through the loaders of the request context, so they batch
/// and cache per request.
#[derive(Debug)]
pub struct QueryHandler<S: RegistryStore> {
    store: Arc<S>,
    loader_config: LoaderConfig,
}

impl QueryHandler<RegistryBackend> {
    /// Creates a handler over the backend selected by the configuration.
    pub async fn from_config(config: &ServerConfig) -> StorageResult<Self> {
        let backend = RegistryBackend::from_config(config).await?;
        Ok(Self::new(Arc::new(backend), config.loader_config()))
    }
}

impl<S: RegistryStore> QueryHandler<S> {
    /// Creates a new query handler.
    pub fn new(store: Arc<S>, loader_config: LoaderConfig) -> Self {
        Self {
            store,
            loader_config,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Starts a request: a fresh loader registry in a new context.
    ///
    /// The registry lives as long as the returned context.
    pub fn begin_request(&self) -> RequestContext<S> {
        let request_id = Uuid::new_v4().to_string();
        debug!(request_id = %request_id, "Starting request");
        RequestContext::new(request_id).with_registry(LoaderRegistry::new(
            Arc::clone(&self.store),
            self.loader_config,
        ))
    }

    /// Lists companies, optionally limited.
    #[instrument(skip(self))]
    pub async fn companies(&self, limit: Option<u32>) -> QueryResult<Vec<Company>> {
        self.store
            .list_companies(limit)
            .await
            .map_err(failed("companies"))
    }

    /// Gets a company by base-id.
    #[instrument(skip(self))]
    pub async fn company(&self, base_id: &str) -> QueryResult<Company> {
        let base_id = validate_base_id(base_id).map_err(failed("company"))?;
        self.store
            .get_company(base_id)
            .await
            .map_err(failed("company"))?
            .ok_or_else(|| not_found("company", "company", base_id))
    }

    /// Gets an establishment by id.
    #[instrument(skip(self))]
    pub async fn establishment(&self, id: i64) -> QueryResult<Establishment> {
        self.store
            .get_establishment(id)
            .await
            .map_err(failed("establishment"))?
            .ok_or_else(|| not_found("establishment", "establishment", &id.to_string()))
    }

    /// Gets a company's head office, or its lowest-id establishment.
    #[instrument(skip(self))]
    pub async fn establishment_by_base_id(&self, base_id: &str) -> QueryResult<Establishment> {
        const OP: &str = "establishment_by_base_id";
        let base_id = validate_base_id(base_id).map_err(failed(OP))?;
        self.store
            .get_establishment_by_base_id(base_id)
            .await
            .map_err(failed(OP))?
            .ok_or_else(|| not_found(OP, "establishment", base_id))
    }

    /// Lists a company's partners through the request's partners loader.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    pub async fn partners_by_base_id(
        &self,
        ctx: &RequestContext<S>,
        base_id: &str,
    ) -> QueryResult<Vec<Partner>> {
        const OP: &str = "partners_by_base_id";
        let base_id = validate_base_id(base_id).map_err(failed(OP))?;
        let loaders = ctx.loaders().map_err(failed(OP))?;
        loaders
            .partners()
            .load(base_id.to_string())
            .await
            .map_err(failed(OP))
    }

    /// Gets an activity code through the request's activity-code loader.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
    pub async fn activity_code_by_code(
        &self,
        ctx: &RequestContext<S>,
        code: &str,
    ) -> QueryResult<ActivityCode> {
        const OP: &str = "activity_code_by_code";
        let code = validate_activity_code(code).map_err(failed(OP))?;
        let loaders = ctx.loaders().map_err(failed(OP))?;
        loaders
            .activity_codes()
            .load(code.to_string())
            .await
            .map_err(failed(OP))
    }

    /// Searches establishments and enriches them into prospect records.
    ///
    /// Roots that cannot be enriched are left out; see
    /// [`search_prospect_batch`](Self::search_prospect_batch) to get them.
    pub async fn search_prospects(
        &self,
        ctx: &RequestContext<S>,
        filter: &ProspectFilter,
        pagination: &Pagination,
    ) -> QueryResult<Vec<ProspectRecord>> {
        Ok(self
            .search_prospect_batch(ctx, filter, pagination)
            .await?
            .records)
    }

    /// Searches establishments and enriches them, reporting skipped roots.
    #[instrument(skip(self, ctx, filter), fields(request_id = %ctx.request_id()))]
    pub async fn search_prospect_batch(
        &self,
        ctx: &RequestContext<S>,
        filter: &ProspectFilter,
        pagination: &Pagination,
    ) -> QueryResult<ProspectBatch> {
        const OP: &str = "search_prospects";
        let roots = self
            .store
            .find_establishments(filter, pagination)
            .await
            .map_err(failed(OP))?;

        if roots.is_empty() {
            debug!("No establishments matched the filter");
            return Ok(ProspectBatch::default());
        }

        let loaders = ctx.loaders().map_err(failed(OP))?;
        Ok(assemble(loaders, roots).await)
    }
}

fn not_found(operation: &'static str, entity: &'static str, key: &str) -> QueryError {
    QueryError::new(
        operation,
        DomainError::NotFound {
            entity,
            key: key.to_string(),
        },
    )
}
