//! Query Executor - runs search descriptors against a data source
//!
//! A [`DataSource`] fetches rows for structured requests; its
//! [`FilterAdapter`] renders boolean clauses in the backend's grammar. Two
//! sources ship with the crate: [`RestDataSource`] for PostgREST-compatible
//! HTTP APIs and [`PgDataSource`] for direct PostgreSQL access.

#[cfg(feature = "debug-logging")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

pub mod adapter;
pub mod errors;
pub mod executor;
pub mod postgres;
pub mod prelude;
pub mod rest;
pub mod source;

pub use adapter::{FilterAdapter, PostgrestAdapter, SqlAdapter};
pub use errors::{DataSourceError, QueryError, TranslationError};
pub use executor::{ExecutionResult, Executor, TranslatedQuery};
pub use postgres::PgDataSource;
pub use rest::RestDataSource;
pub use source::{CountRequest, DataSource, FetchRequest, FilterOp, Row};
