//! # QueryKit
//!
//! Dynamic search queries for PostgreSQL-backed listing search: a fluent
//! builder for nested boolean filters, full-text search, sorting, pagination
//! and joins, with validation, optimization and complexity analysis, executed
//! through a PostgREST-compatible API or a direct database connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use querykit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let search = SearchService::from_config(&config).await?;
//!
//!     let descriptor = search
//!         .builder()
//!         .text_search("BMW 3 Series", TextSearchOptions::default())
//!         .filter("year", Operator::Gte, 2018)
//!         .filter_group(Logic::Or, |g| {
//!             g.filter("fuel_type", Operator::Eq, "diesel")
//!                 .filter("fuel_type", Operator::Eq, "hybrid")
//!         })
//!         .paginate(1, 12)
//!         .build()?;
//!
//!     let result = search.search(&descriptor).await?;
//!     println!("{} of {:?} listings", result.data.len(), result.count);
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use core::SearchService;
pub use errors::QueryKitError;

pub use cache_system;
pub use config;
pub use query_executor;
pub use query_model;
