//! prospecta-domain: Batched loading and record aggregation
//!
//! This crate contains the request-scoped data loading logic including:
//! - Batching, caching loaders per entity type
//! - The per-request loader registry and request context
//! - Aggregation of establishments into prospect records
//! - Key validation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              prospecta-domain                │
//! ├─────────────────────────────────────────────┤
//! │  loader/     - Batching loaders & fetchers  │
//! │  registry/   - Loader registry & context    │
//! │  prospect/   - Aggregation pipeline         │
//! │  validation/ - Key validation               │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod loader;
pub mod prospect;
pub mod registry;
pub mod validation;

#[cfg(test)]
mod mocks;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult, LoadError, LoadResult};
pub use loader::{BatchFetch, BatchLoader, LoaderConfig, LoaderStats, Pending};
pub use prospect::{assemble, ProspectBatch, ProspectRecord, SkipReason, SkippedRecord};
pub use registry::{LoaderRegistry, RequestContext};
