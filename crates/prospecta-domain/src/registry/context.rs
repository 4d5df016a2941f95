//! Request context carrying the loader registry.

use std::sync::Arc;

use prospecta_storage::RegistryStore;
use tracing::error;

use crate::error::{DomainError, DomainResult};

use super::LoaderRegistry;

/// State that travels with one request.
///
/// Handlers receive the context by reference and reach the loaders through
/// [`RequestContext::loaders`].
pub struct RequestContext<S: RegistryStore> {
    request_id: String,
    registry: Option<Arc<LoaderRegistry<S>>>,
}

impl<S: RegistryStore> RequestContext<S> {
    /// Creates a context with no registry attached.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            registry: None,
        }
    }

    /// Attaches the request's loader registry, replacing any previous one.
    pub fn attach(&mut self, registry: LoaderRegistry<S>) {
        self.registry = Some(Arc::new(registry));
    }

    /// Builder form of [`RequestContext::attach`].
    pub fn with_registry(mut self, registry: LoaderRegistry<S>) -> Self {
        self.attach(registry);
        self
    }

    /// Detaches the registry. Loads that were never flushed resolve to
    /// cancelled once the last handle to the registry is gone.
    pub fn detach(&mut self) -> Option<Arc<LoaderRegistry<S>>> {
        self.registry.take()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the request's loaders.
    ///
    /// A context without a registry is a wiring error in the caller; it is
    /// reported as [`DomainError::ContextMissing`] rather than a panic.
    pub fn loaders(&self) -> DomainResult<&LoaderRegistry<S>> {
        match &self.registry {
            Some(registry) => Ok(registry.as_ref()),
            None => {
                error!(request_id = %self.request_id, "No loader registry attached to request");
                Err(DomainError::ContextMissing {
                    request_id: self.request_id.clone(),
                })
            }
        }
    }
}

impl<S: RegistryStore> std::fmt::Debug for RequestContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("has_registry", &self.registry.is_some())
            .finish()
    }
}
