//! Convenience re-exports for common QueryKit usage
//!
//! ```rust
//! use querykit::prelude::*;
//! ```

pub use crate::core::SearchService;
pub use crate::errors::QueryKitError;

pub use config::{AppConfig, CacheConfig, DatabaseConfig, QueryConfig, RestConfig};

pub use query_model::prelude::*;

pub use query_executor::prelude::*;

pub use cache_system::prelude::*;

pub use tokio;
