pub use crate::adapter::{FilterAdapter, PostgrestAdapter, SqlAdapter};
pub use crate::errors::{DataSourceError, QueryError, TranslationError};
pub use crate::executor::{ExecutionResult, Executor, TranslatedQuery};
pub use crate::postgres::PgDataSource;
pub use crate::rest::RestDataSource;
pub use crate::source::{CountRequest, DataSource, FetchRequest, FilterOp, Row};
