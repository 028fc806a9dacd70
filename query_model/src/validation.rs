//! Query validation
//!
//! Structural and semantic checks on a [`QueryDescriptor`] before it reaches a
//! data source. Problems are reported as strings in a [`ValidationResult`];
//! the validator never fails on bad input.

use crate::clause::{fold_group, GroupPath};
use crate::condition::{Condition, Logic, Operator, TextSearch};
use crate::descriptor::{Pagination, QueryDescriptor, SortSpec};
use crate::group::Group;
use crate::identifiers::{ValidatedFieldName, ValidatedTableName};
use crate::join::JoinSpec;
use config::QueryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Bounds enforced by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_text_query_length: usize,
    pub max_page_limit: u32,
    pub max_group_depth: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_text_query_length: 1000,
            max_page_limit: 100,
            max_group_depth: 5,
        }
    }
}

impl From<&QueryConfig> for ValidationLimits {
    fn from(config: &QueryConfig) -> Self {
        Self {
            max_text_query_length: config.max_text_query_length,
            max_page_limit: config.max_page_limit,
            max_group_depth: config.max_group_depth,
        }
    }
}

/// Outcome of validating a descriptor.
///
/// `is_valid` is true iff `errors` is empty; warnings and optimizations are
/// advisory only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default)]
    pub optimizations: Vec<String>,
}

/// Errors and warnings gathered while walking part of a descriptor
#[derive(Debug, Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn absorb(&mut self, other: Findings) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryValidator {
    limits: ValidationLimits,
}

impl QueryValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate a descriptor
    pub fn validate(&self, descriptor: &QueryDescriptor) -> ValidationResult {
        let mut findings = Findings::default();

        if let Some(text_search) = &descriptor.text_search {
            self.check_text_search(text_search, &mut findings);
        }

        for (index, condition) in descriptor.conditions.iter().enumerate() {
            let prefix = format!("Condition {}: ", index + 1);
            check_condition(condition, &prefix, &mut findings);
        }

        for (index, group) in descriptor.groups.iter().enumerate() {
            findings.absorb(self.check_group(group, &GroupPath::root(index + 1)));
        }

        for (index, sort) in descriptor.sorting.iter().enumerate() {
            check_sort(sort, index + 1, &mut findings);
        }

        if let Some(pagination) = &descriptor.pagination {
            self.check_pagination(pagination, &mut findings);
        }

        for (index, join) in descriptor.joins.iter().enumerate() {
            check_join(join, index + 1, &mut findings);
        }

        let optimizations = optimization_hints(descriptor);

        trace_log!(
            "validated descriptor: {} errors, {} warnings",
            findings.errors.len(),
            findings.warnings.len()
        );

        ValidationResult {
            is_valid: findings.errors.is_empty(),
            errors: findings.errors,
            warnings: findings.warnings,
            optimizations,
        }
    }

    fn check_text_search(&self, text_search: &TextSearch, findings: &mut Findings) {
        if text_search.query.trim().is_empty() {
            findings
                .errors
                .push("Text search query cannot be empty".to_string());
        }

        if text_search.query.chars().count() > self.limits.max_text_query_length {
            findings.errors.push(format!(
                "Text search query exceeds maximum length of {} characters",
                self.limits.max_text_query_length
            ));
        }

        if let Some(fields) = &text_search.fields {
            if fields.is_empty() {
                findings.warnings.push(
                    "Text search field list is empty; the search vector will be used".to_string(),
                );
            }
            for field in fields {
                if let Err(err) = ValidatedFieldName::new(field) {
                    findings
                        .errors
                        .push(format!("Text search field is invalid: {}", err));
                }
            }
        }
    }

    fn check_group(&self, group: &Group, path: &GroupPath) -> Findings {
        let max_depth = self.limits.max_group_depth;

        fold_group(
            group,
            path,
            &mut |path: &GroupPath, position: usize, condition: &Condition| {
                let mut findings = Findings::default();
                let prefix = format!("{}, Condition {}: ", path, position);
                check_condition(condition, &prefix, &mut findings);
                findings
            },
            &mut |path: &GroupPath, group: &Group, children: Vec<Findings>| {
                let mut findings = Findings::default();

                if group.conditions.is_empty() {
                    findings.errors.push(format!(
                        "{}: Group must contain at least one condition",
                        path
                    ));
                } else if group.conditions.len() == 1 {
                    findings.warnings.push(format!(
                        "{}: Group has a single condition; the {} grouping has no effect",
                        path, group.logic
                    ));
                }

                // Report only where the limit is first crossed
                if path.depth() == max_depth + 1 {
                    findings.errors.push(format!(
                        "{}: Group nesting exceeds maximum depth of {}",
                        path, max_depth
                    ));
                }

                for child in children {
                    findings.absorb(child);
                }
                findings
            },
        )
    }

    fn check_pagination(&self, pagination: &Pagination, findings: &mut Findings) {
        if pagination.page < 1 {
            findings
                .errors
                .push("Page must be greater than or equal to 1".to_string());
        }

        if pagination.limit < 1 || pagination.limit > self.limits.max_page_limit {
            findings.errors.push(format!(
                "Limit must be between 1 and {}",
                self.limits.max_page_limit
            ));
        }
    }
}

/// Validate with default limits
pub fn validate(descriptor: &QueryDescriptor) -> ValidationResult {
    QueryValidator::default().validate(descriptor)
}

fn check_condition(condition: &Condition, prefix: &str, findings: &mut Findings) {
    if condition.field.is_empty() {
        findings.errors.push(format!("{}Field is required", prefix));
    } else if let Err(err) = ValidatedFieldName::new(&condition.field) {
        findings
            .errors
            .push(format!("{}Invalid field name: {}", prefix, err));
    }

    let operator = condition.operator;

    if operator.is_null_check() {
        if condition.has_value() {
            findings.warnings.push(format!(
                "{}Value is ignored for operator '{}'",
                prefix, operator
            ));
        }
        return;
    }

    let value = match &condition.value {
        Some(value) if !value.is_null() => value,
        _ => {
            findings.errors.push(format!(
                "{}Value is required for operator '{}'",
                prefix, operator
            ));
            return;
        }
    };

    if operator.requires_array() {
        match value {
            Value::Array(values) if values.is_empty() => match operator {
                Operator::NotIn => findings.warnings.push(format!(
                    "{}Operator 'not_in' with an empty array matches every row",
                    prefix
                )),
                _ => findings.warnings.push(format!(
                    "{}Operator '{}' with an empty array matches no rows",
                    prefix, operator
                )),
            },
            Value::Array(_) => {}
            _ => findings.errors.push(format!(
                "{}Operator '{}' requires an array value",
                prefix, operator
            )),
        }
    } else if operator.is_containment() {
        if !matches!(value, Value::Array(_) | Value::Object(_)) {
            findings.errors.push(format!(
                "{}Operator '{}' requires an array or object value",
                prefix, operator
            ));
        }
    } else if value.is_array() || value.is_object() {
        findings.errors.push(format!(
            "{}Operator '{}' requires a scalar value",
            prefix, operator
        ));
    } else if operator.is_pattern() {
        match value.as_str() {
            Some(pattern) if !pattern.contains('%') => findings.warnings.push(format!(
                "{}Pattern '{}' for operator '{}' has no '%' wildcard; consider 'eq'",
                prefix, pattern, operator
            )),
            Some(_) => {}
            None => findings.errors.push(format!(
                "{}Operator '{}' requires a string pattern",
                prefix, operator
            )),
        }
    }
}

fn check_sort(sort: &SortSpec, position: usize, findings: &mut Findings) {
    if sort.field.is_empty() {
        findings
            .errors
            .push(format!("Sort {}: Field is required", position));
    } else if let Err(err) = ValidatedFieldName::new(&sort.field) {
        findings
            .errors
            .push(format!("Sort {}: Invalid field name: {}", position, err));
    }
}

fn check_join(join: &JoinSpec, position: usize, findings: &mut Findings) {
    if join.table.is_empty() {
        findings
            .errors
            .push(format!("Join {}: Table is required", position));
    } else if let Err(err) = ValidatedTableName::new(&join.table) {
        findings
            .errors
            .push(format!("Join {}: Invalid table name: {}", position, err));
    }

    if let Some(alias) = &join.alias {
        if let Err(err) = ValidatedTableName::new(alias) {
            findings
                .errors
                .push(format!("Join {}: Invalid alias: {}", position, err));
        }
    }

    for column in &join.columns {
        if let Err(err) = ValidatedFieldName::new(column) {
            findings
                .errors
                .push(format!("Join {}: Invalid column name: {}", position, err));
        }
    }

    if let Some(on) = &join.on {
        for field in [&on.local_field, &on.foreign_field] {
            if let Err(err) = ValidatedFieldName::new(field) {
                findings
                    .errors
                    .push(format!("Join {}: Invalid join key: {}", position, err));
            }
        }
    }
}

/// Rewrites the optimizer would apply, phrased as advice
fn optimization_hints(descriptor: &QueryDescriptor) -> Vec<String> {
    let mut hints = Vec::new();

    let mut eq_counts: HashMap<(&str, Logic), usize> = HashMap::new();
    let mut order: Vec<(&str, Logic)> = Vec::new();
    for condition in &descriptor.conditions {
        if condition.operator == Operator::Eq && condition.has_value() {
            let key = (condition.field.as_str(), condition.effective_logic());
            let count = eq_counts.entry(key).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }
    }

    for key in order {
        if eq_counts.get(&key).copied().unwrap_or(0) > 1 {
            hints.push(format!(
                "Equality conditions on '{}' can be merged into a single IN condition",
                key.0
            ));
        }
    }

    if descriptor.text_search.is_some() && descriptor.sorting.len() > 1 {
        hints.push(
            "Multiple sort fields override text relevance ordering; consider a single sort field"
                .to_string(),
        );
    }

    hints
}
