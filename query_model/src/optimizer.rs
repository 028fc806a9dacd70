//! Query optimizer and complexity analysis
//!
//! Three independent, pure passes over a descriptor:
//! - [`QueryOptimizer::optimize`] rewrites same-field equality conditions into `IN`
//! - [`QueryOptimizer::analyze_complexity`] scores how expensive a query is likely to be
//! - [`QueryOptimizer::suggest_indexes`] lists indexes that would help it

use crate::clause::{fold_group, GroupPath};
use crate::condition::{Condition, Logic, Operator};
use crate::descriptor::QueryDescriptor;
use crate::group::Group;
use config::QueryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Score above which a query is reported as complex
const HIGH_COMPLEXITY_SCORE: u32 = 25;
/// Group depth above which nesting is reported
const DEEP_NESTING: usize = 3;
/// `IN` lists longer than this are flagged
const LARGE_IN_LIST: usize = 50;
/// Structured conditions above this count make text search ranking costlier
const TEXT_SEARCH_CONDITION_ALLOWANCE: usize = 5;

/// Heuristic cost estimate of a descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityScore {
    pub score: u32,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QueryOptimizer {
    condition_warning_threshold: usize,
    deep_page_threshold: u32,
}

impl Default for QueryOptimizer {
    fn default() -> Self {
        Self {
            condition_warning_threshold: 10,
            deep_page_threshold: 100,
        }
    }
}

impl From<&QueryConfig> for QueryOptimizer {
    fn from(config: &QueryConfig) -> Self {
        Self {
            condition_warning_threshold: config.condition_warning_threshold,
            deep_page_threshold: config.deep_page_threshold,
        }
    }
}

impl QueryOptimizer {
    pub fn new(condition_warning_threshold: usize, deep_page_threshold: u32) -> Self {
        Self {
            condition_warning_threshold,
            deep_page_threshold,
        }
    }

    /// Merge flat `eq` conditions sharing a field (and logic) into one `IN`.
    ///
    /// The merged condition takes the position of the first occurrence; values
    /// keep first-seen order without duplicates. A field whose values are all
    /// equal stays a single `eq`. Nothing else is touched, which makes the
    /// rewrite idempotent.
    pub fn optimize(&self, descriptor: &QueryDescriptor) -> QueryDescriptor {
        let mut eq_counts: HashMap<(&str, Logic), usize> = HashMap::new();
        for condition in &descriptor.conditions {
            if is_mergeable(condition) {
                *eq_counts
                    .entry((condition.field.as_str(), condition.effective_logic()))
                    .or_insert(0) += 1;
            }
        }

        let mut conditions: Vec<Condition> = Vec::with_capacity(descriptor.conditions.len());
        let mut merged_at: HashMap<(&str, Logic), usize> = HashMap::new();

        for condition in &descriptor.conditions {
            let key = (condition.field.as_str(), condition.effective_logic());
            let merge = is_mergeable(condition) && eq_counts.get(&key).copied().unwrap_or(0) > 1;

            if !merge {
                conditions.push(condition.clone());
                continue;
            }

            let value = condition.value.clone().unwrap_or(Value::Null);
            match merged_at.get(&key) {
                Some(&slot) => {
                    if let Some(Value::Array(values)) = &mut conditions[slot].value {
                        if !values.contains(&value) {
                            values.push(value);
                        }
                    }
                }
                None => {
                    merged_at.insert(key, conditions.len());
                    let mut merged = condition.clone();
                    merged.operator = Operator::In;
                    merged.value = Some(Value::Array(vec![value]));
                    conditions.push(merged);
                }
            }
        }

        for &slot in merged_at.values() {
            let merged = &mut conditions[slot];
            if let Some(Value::Array(values)) = &mut merged.value {
                if values.len() == 1 {
                    let single = values.remove(0);
                    merged.operator = Operator::Eq;
                    merged.value = Some(single);
                }
            }
        }

        if !merged_at.is_empty() {
            tracing::debug!(
                merged_fields = merged_at.len(),
                before = descriptor.conditions.len(),
                after = conditions.len(),
                "merged equality conditions"
            );
        }

        QueryDescriptor {
            conditions,
            ..descriptor.clone()
        }
    }

    /// Score a descriptor. Every term is non-negative and grows with the
    /// amount of structure, so adding conditions, groups, sort keys or joins
    /// never lowers the score.
    pub fn analyze_complexity(&self, descriptor: &QueryDescriptor) -> ComplexityScore {
        let mut score: u32 = 0;
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        for condition in &descriptor.conditions {
            score += condition_cost(condition);
        }

        for (index, group) in descriptor.groups.iter().enumerate() {
            score += group_cost(group, &GroupPath::root(index + 1));
        }

        let total_conditions = descriptor.total_condition_count();

        if let Some(text_search) = &descriptor.text_search {
            score += 3;
            score += to_u32(total_conditions.saturating_sub(TEXT_SEARCH_CONDITION_ALLOWANCE));
            if let Some(fields) = &text_search.fields {
                // pattern scan per field instead of one index lookup
                score += to_u32(fields.len());
            }
            if total_conditions > TEXT_SEARCH_CONDITION_ALLOWANCE {
                recommendations.push(
                    "Narrow results with fewer structured filters before ranking text matches"
                        .to_string(),
                );
            }
            if descriptor.sorting.len() > 1 {
                recommendations.push(format!(
                    "Text search combined with {} sort fields dilutes relevance ordering; sort by relevance or a single field",
                    descriptor.sorting.len()
                ));
            }
        }

        score += to_u32(descriptor.sorting.len());
        score += 2 * to_u32(descriptor.joins.len());

        if let Some(pagination) = &descriptor.pagination {
            if pagination.page > self.deep_page_threshold {
                score += 5;
                warnings.push(format!(
                    "Deep pagination (page {}) requires the backend to skip {} rows",
                    pagination.page,
                    pagination.offset()
                ));
                recommendations
                    .push("Use keyset (cursor) pagination for deep result pages".to_string());
            }
            if pagination.page > self.deep_page_threshold.saturating_mul(10) {
                score += 10;
            }
        }

        if total_conditions > self.condition_warning_threshold {
            warnings.push(format!(
                "High number of conditions ({}) may impact query performance",
                total_conditions
            ));
        }

        let depth = descriptor.max_group_depth();
        if depth > DEEP_NESTING {
            warnings.push(format!(
                "Deeply nested groups (depth {}) produce complex filter clauses",
                depth
            ));
        }

        for condition in descriptor.all_conditions() {
            if let Some(values) = condition.array_values() {
                if condition.operator == Operator::In && values.len() > LARGE_IN_LIST {
                    recommendations.push(format!(
                        "Large IN list on '{}' ({} values); consider a join or a lookup table",
                        condition.field,
                        values.len()
                    ));
                }
            }
            if has_leading_wildcard(condition) {
                recommendations.push(format!(
                    "Leading wildcard on '{}' cannot use a B-tree index; consider a trigram index or text search",
                    condition.field
                ));
            }
        }

        if score > HIGH_COMPLEXITY_SCORE {
            warnings.push(format!("Query complexity score {} is high", score));
        }

        ComplexityScore {
            score,
            warnings,
            recommendations,
        }
    }

    /// Advisory index suggestions derived from filtered and sorted fields
    pub fn suggest_indexes(&self, descriptor: &QueryDescriptor) -> Vec<String> {
        let mut suggestions: Vec<String> = Vec::new();
        let mut push = |suggestion: String| {
            if !suggestions.contains(&suggestion) {
                suggestions.push(suggestion);
            }
        };

        let mut equality_fields: Vec<&str> = Vec::new();

        for condition in descriptor.all_conditions() {
            let field = condition.field.as_str();
            match condition.operator {
                Operator::Eq | Operator::Neq | Operator::In | Operator::NotIn => {
                    if !equality_fields.contains(&field) {
                        equality_fields.push(field);
                    }
                    push(format!("B-tree index on '{}' for equality filters", field));
                }
                Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                    push(format!("B-tree index on '{}' for range filters", field));
                }
                Operator::Like | Operator::Ilike => {
                    push(format!(
                        "Trigram GIN index (pg_trgm) on '{}' for pattern matching",
                        field
                    ));
                }
                Operator::Contains | Operator::ContainedBy | Operator::Overlaps => {
                    push(format!(
                        "GIN index on '{}' for containment and overlap filters",
                        field
                    ));
                }
                Operator::IsNull | Operator::NotNull => {
                    push(format!("Partial index on '{}' for null checks", field));
                }
            }
        }

        if let Some(text_search) = &descriptor.text_search {
            match &text_search.fields {
                Some(fields) if !fields.is_empty() => {
                    for field in fields {
                        push(format!(
                            "Trigram GIN index (pg_trgm) on '{}' for pattern matching",
                            field
                        ));
                    }
                }
                _ => push(format!(
                    "GIN index on the full-text search vector ({} configuration)",
                    text_search.config.as_str()
                )),
            }
        }

        for sort in &descriptor.sorting {
            push(format!(
                "B-tree index on '{}' to support ORDER BY {} {}",
                sort.field,
                sort.field,
                sort.order.to_sql()
            ));
        }

        if let Some(first_sort) = descriptor.sorting.first() {
            if !equality_fields.is_empty() && !equality_fields.contains(&first_sort.field.as_str()) {
                push(format!(
                    "Composite index on ({}, {}) for filtered ordering",
                    equality_fields.join(", "),
                    first_sort.field
                ));
            }
        }

        suggestions
    }
}

/// Optimize with default settings
pub fn optimize(descriptor: &QueryDescriptor) -> QueryDescriptor {
    QueryOptimizer::default().optimize(descriptor)
}

/// Analyze complexity with default thresholds
pub fn analyze_complexity(descriptor: &QueryDescriptor) -> ComplexityScore {
    QueryOptimizer::default().analyze_complexity(descriptor)
}

pub fn suggest_indexes(descriptor: &QueryDescriptor) -> Vec<String> {
    QueryOptimizer::default().suggest_indexes(descriptor)
}

fn is_mergeable(condition: &Condition) -> bool {
    condition.operator == Operator::Eq && condition.has_value()
}

fn has_leading_wildcard(condition: &Condition) -> bool {
    condition.operator.is_pattern()
        && condition
            .value
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|pattern| pattern.starts_with('%'))
}

fn to_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn condition_cost(condition: &Condition) -> u32 {
    let fan_out = condition
        .array_values()
        .map(|values| to_u32(values.len() / 10))
        .unwrap_or(0);
    let pattern = if has_leading_wildcard(condition) { 2 } else { 0 };
    1 + fan_out + pattern
}

/// Each condition costs as much as a flat one; each group costs twice its depth
fn group_cost(group: &Group, path: &GroupPath) -> u32 {
    fold_group(
        group,
        path,
        &mut |_: &GroupPath, _: usize, condition: &Condition| condition_cost(condition),
        &mut |path: &GroupPath, _: &Group, children: Vec<u32>| {
            2 * to_u32(path.depth()) + children.iter().sum::<u32>()
        },
    )
}
