//! Request handlers.

pub mod query;

pub use query::{QueryError, QueryHandler, QueryResult};
