//! Data collaborator interface
//!
//! A [`DataSource`] executes structured fetch and count requests against a
//! backend and returns rows as JSON. Everything a source needs is in the
//! request; sources hold no per-query state.

use crate::adapter::FilterAdapter;
use crate::errors::DataSourceError;
use async_trait::async_trait;
use query_model::condition::{Condition, Logic, TextSearchConfig, TextSearchType};
use query_model::descriptor::SortSpec;
use query_model::join::JoinSpec;
use serde_json::Value;

/// One result row
pub type Row = Value;

/// A single filter operation; all operations of a request are ANDed
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Plain condition applied directly
    Condition(Condition),
    /// Pre-rendered boolean clause in the source adapter's grammar
    Clause { logic: Logic, clause: String },
    /// Full-text match on a search vector column
    TextSearch {
        column: String,
        query: String,
        search_type: TextSearchType,
        config: TextSearchConfig,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub table: String,
    pub joins: Vec<JoinSpec>,
    pub filters: Vec<FilterOp>,
    pub order: Vec<SortSpec>,
    /// Inclusive row range
    pub range: Option<(u64, u64)>,
}

impl FetchRequest {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            joins: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
        }
    }

    /// Offset and limit of the requested range
    pub fn offset_limit(&self) -> Option<(u64, u64)> {
        self.range
            .map(|(from, to)| (from, to.saturating_sub(from).saturating_add(1)))
    }
}

/// Row count with the same joins and filters as a fetch, without ordering or range
#[derive(Debug, Clone, PartialEq)]
pub struct CountRequest {
    pub table: String,
    /// Inner joins restrict the counted rows, and filters may reference joined columns
    pub joins: Vec<JoinSpec>,
    pub filters: Vec<FilterOp>,
}

impl From<&FetchRequest> for CountRequest {
    fn from(request: &FetchRequest) -> Self {
        Self {
            table: request.table.clone(),
            joins: request.joins.clone(),
            filters: request.filters.clone(),
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Grammar clauses must be rendered in for this source
    fn adapter(&self) -> &dyn FilterAdapter;

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Row>, DataSourceError>;

    async fn count(&self, request: &CountRequest) -> Result<u64, DataSourceError>;

    async fn health_check(&self) -> Result<(), DataSourceError>;
}
