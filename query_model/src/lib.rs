//! Query Model - search query DSL for the querykit workspace
//!
//! Conditions, boolean groups, text search, sorting, pagination and join
//! requests, assembled into a [`QueryDescriptor`] by the fluent
//! [`QueryBuilder`], checked by the [`QueryValidator`] and analyzed by the
//! [`QueryOptimizer`]. Nothing in this crate performs I/O.

#[cfg(feature = "debug-logging")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod builder;
pub mod clause;
pub mod condition;
pub mod descriptor;
pub mod errors;
pub mod group;
pub mod identifiers;
pub mod join;
pub mod optimizer;
pub mod patterns;
pub mod prelude;
pub mod validation;


pub use builder::{GroupBuilder, QueryBuilder};
pub use clause::{fold_group, GroupPath};
pub use condition::{
    Condition, Logic, Operator, TextSearch, TextSearchConfig, TextSearchOptions, TextSearchType,
};
pub use descriptor::{Pagination, QueryDescriptor, SortOrder, SortSpec};
pub use errors::BuilderError;
pub use group::{Group, GroupItem};
pub use identifiers::{IdentifierError, ValidatedFieldName, ValidatedTableName};
pub use join::{JoinOn, JoinSpec, JoinType};
pub use optimizer::{ComplexityScore, QueryOptimizer};
pub use patterns::{CommonQueryPatterns, SearchParams};
pub use validation::{QueryValidator, ValidationLimits, ValidationResult};
