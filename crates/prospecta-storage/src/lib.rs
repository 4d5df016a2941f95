//! prospecta-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for Prospecta, including:
//! - Registry entities (company, establishment, partner, activity code)
//! - RegistryStore trait with bulk fetch-by-keys operations
//! - In-memory implementation for testing
//! - PostgreSQL implementation for production
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             prospecta-storage                │
//! ├─────────────────────────────────────────────┤
//! │  models.rs   - Registry entities            │
//! │  traits.rs   - RegistryStore + filter       │
//! │  memory.rs   - In-memory implementation     │
//! │  postgres.rs - PostgreSQL implementation    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryRegistryStore;
pub use models::{ActivityCode, Company, Establishment, Partner};
pub use postgres::{PostgresConfig, PostgresRegistryStore};
pub use traits::{Pagination, ProspectFilter, RegistryStore};
