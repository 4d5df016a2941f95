//! prospecta-server: query handlers over the company registry
//!
//! This crate wires the loaders and the prospect pipeline to a store:
//! - Startup: logging, store and handler from one configuration
//! - Query handler with per-request loader registries
//! - Backend selection (memory or PostgreSQL)
//! - Configuration management
//! - Structured logging bootstrap
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              prospecta-server               │
//! ├─────────────────────────────────────────────┤
//! │  bootstrap.rs     - Startup sequence        │
//! │  config.rs        - Configuration           │
//! │  backend.rs       - Store selection         │
//! │  observability.rs - Logging setup           │
//! │  handlers/                                  │
//! │    query/         - Registry queries        │
//! └─────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod observability;

// Re-exports for convenience
pub use backend::RegistryBackend;
pub use bootstrap::{bootstrap, BootstrapError};
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::{QueryError, QueryHandler, QueryResult};
pub use observability::init_logging;
