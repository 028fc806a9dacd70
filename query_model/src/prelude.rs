//! Common imports for building and checking queries

pub use crate::builder::{GroupBuilder, QueryBuilder};
pub use crate::condition::{
    Condition, Logic, Operator, TextSearch, TextSearchConfig, TextSearchOptions, TextSearchType,
};
pub use crate::descriptor::{Pagination, QueryDescriptor, SortOrder, SortSpec};
pub use crate::errors::BuilderError;
pub use crate::group::{Group, GroupItem};
pub use crate::join::{JoinSpec, JoinType};
pub use crate::optimizer::{ComplexityScore, QueryOptimizer};
pub use crate::patterns::{CommonQueryPatterns, SearchParams};
pub use crate::validation::{QueryValidator, ValidationResult};
