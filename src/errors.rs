//! Error types for the QueryKit crate
//!
//! [`QueryKitError`] wraps the errors of every workspace crate so service
//! callers handle a single type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryKitError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache_system::CacheError),

    #[error("Data source error: {0}")]
    DataSource(#[from] query_executor::DataSourceError),

    #[error(transparent)]
    Query(#[from] query_executor::QueryError),

    #[error("Query builder error: {0}")]
    Builder(#[from] query_model::BuilderError),

    #[error("No data source configured; set either [rest] or [database]")]
    NoDataSource,
}

impl QueryKitError {
    /// Status a route layer should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            QueryKitError::Query(err) => err.http_status(),
            QueryKitError::Builder(_) => 400,
            _ => 500,
        }
    }
}
