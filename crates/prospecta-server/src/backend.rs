//! Storage backend selected by configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use prospecta_storage::{
    ActivityCode, Company, Establishment, MemoryRegistryStore, Pagination, Partner,
    PostgresRegistryStore, ProspectFilter, RegistryStore, StorageError, StorageResult,
};
use tracing::info;

use crate::config::ServerConfig;

/// The registry store configured for this process.
#[derive(Debug)]
pub enum RegistryBackend {
    Memory(MemoryRegistryStore),
    Postgres(PostgresRegistryStore),
}

impl RegistryBackend {
    /// Connects the backend named by `storage.backend`.
    ///
    /// PostgreSQL connections are retried per the storage settings and the
    /// registry tables are created if missing.
    pub async fn from_config(config: &ServerConfig) -> StorageResult<Self> {
        match config.storage.backend.as_str() {
            "memory" => {
                info!("Using in-memory storage backend");
                Ok(Self::Memory(MemoryRegistryStore::new()))
            }
            "postgres" => {
                let Some(pg_config) = config.postgres_config() else {
                    return Err(StorageError::InvalidInput {
                        message: "storage.database_url is required for postgres backend"
                            .to_string(),
                    });
                };

                info!("Connecting to PostgreSQL database");
                let store = PostgresRegistryStore::from_config(&pg_config).await?;
                store.run_migrations().await?;
                info!("PostgreSQL connection established");
                Ok(Self::Postgres(store))
            }
            other => Err(StorageError::InvalidInput {
                message: format!("unknown storage backend: {other}"),
            }),
        }
    }

    /// Backend name as used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }

    fn store(&self) -> &dyn RegistryStore {
        match self {
            Self::Memory(store) => store,
            Self::Postgres(store) => store,
        }
    }
}

#[async_trait]
impl RegistryStore for RegistryBackend {
    async fn fetch_companies(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Company>> {
        self.store().fetch_companies(base_ids).await
    }

    async fn fetch_partners(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Vec<Partner>>> {
        self.store().fetch_partners(base_ids).await
    }

    async fn fetch_activity_codes(
        &self,
        codes: &[String],
    ) -> StorageResult<HashMap<String, ActivityCode>> {
        self.store().fetch_activity_codes(codes).await
    }

    async fn list_companies(&self, limit: Option<u32>) -> StorageResult<Vec<Company>> {
        self.store().list_companies(limit).await
    }

    async fn get_company(&self, base_id: &str) -> StorageResult<Option<Company>> {
        self.store().get_company(base_id).await
    }

    async fn get_establishment(&self, id: i64) -> StorageResult<Option<Establishment>> {
        self.store().get_establishment(id).await
    }

    async fn get_establishment_by_base_id(
        &self,
        base_id: &str,
    ) -> StorageResult<Option<Establishment>> {
        self.store().get_establishment_by_base_id(base_id).await
    }

    async fn find_establishments(
        &self,
        filter: &ProspectFilter,
        pagination: &Pagination,
    ) -> StorageResult<Vec<Establishment>> {
        self.store().find_establishments(filter, pagination).await
    }
}
