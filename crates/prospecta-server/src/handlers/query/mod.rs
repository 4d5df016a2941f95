//! Registry query handler.
//!
//! Exposes the query surface over companies, establishments, partners,
//! activity codes and prospect searches. A caller starts each inbound
//! request with [`QueryHandler::begin_request`] and passes the returned
//! context to every operation of that request:
//!
//! ```ignore
//! let ctx = handler.begin_request();
//! let records = handler
//!     .search_prospects(&ctx, &filter, &Pagination::new(Some(50), None))
//!     .await?;
//! ```
//!
//! Relation lookups issued within one request share the request's loaders,
//! so they are batched and cached until the context is dropped.

mod handler;
mod types;

pub use handler::QueryHandler;
pub use types::{QueryError, QueryResult};
