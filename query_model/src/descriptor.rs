//! Query descriptor
//!
//! The complete, owned description of a search request. Descriptors are plain
//! values: the builder produces them, the validator and optimizer read them,
//! and the executor translates them.

use crate::condition::{Condition, TextSearch};
use crate::group::Group;
use crate::join::JoinSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Desc)
    }
}

/// Page-based pagination; pages start at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Inclusive row range `(from, to)` covered by this page
    pub fn range(&self) -> (u64, u64) {
        let from = self.offset();
        (from, (from + u64::from(self.limit)).saturating_sub(1))
    }
}

/// Complete description of a search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_search: Option<TextSearch>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// No filters, sorting, pagination or joins
    pub fn is_empty(&self) -> bool {
        self.text_search.is_none()
            && self.conditions.is_empty()
            && self.groups.is_empty()
            && self.sorting.is_empty()
            && self.pagination.is_none()
            && self.joins.is_empty()
    }

    /// Flat conditions followed by every condition nested in groups
    pub fn all_conditions(&self) -> Vec<&Condition> {
        self.conditions
            .iter()
            .chain(self.groups.iter().flat_map(|group| group.leaf_conditions()))
            .collect()
    }

    pub fn total_condition_count(&self) -> usize {
        self.conditions.len()
            + self
                .groups
                .iter()
                .map(|group| group.leaf_conditions().len())
                .sum::<usize>()
    }

    /// Deepest group nesting, 0 without groups
    pub fn max_group_depth(&self) -> usize {
        self.groups.iter().map(Group::depth).max().unwrap_or(0)
    }
}
