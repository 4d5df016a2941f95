//! Process startup: logging, then the configured store, then the handler.

use prospecta_storage::StorageError;
use tracing::info;

use crate::backend::RegistryBackend;
use crate::config::{ConfigLoadError, ServerConfig};
use crate::handlers::QueryHandler;
use crate::observability::init_logging;

/// Errors raised while starting up.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("failed to open registry store: {0}")]
    Storage(#[from] StorageError),
}

/// Validates `config`, installs logging and connects the configured store.
pub async fn bootstrap(
    config: &ServerConfig,
) -> Result<QueryHandler<RegistryBackend>, BootstrapError> {
    config.validate()?;
    init_logging(&config.logging)?;

    info!(
        backend = %config.storage.backend,
        max_batch_size = config.loader.max_batch_size,
        wait_millis = config.loader.wait_millis,
        "Starting prospecta"
    );
    Ok(QueryHandler::from_config(config).await?)
}
