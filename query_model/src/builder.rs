//! Fluent query builder
//!
//! Chainable construction of a [`QueryDescriptor`]. Misuse (an empty field
//! name, a missing value, a scalar where an array is required) is caught at the
//! call that introduced it; the first such error is kept and returned by
//! [`QueryBuilder::build`]. Conditions added after an error are ignored.

use crate::condition::{Condition, Logic, Operator, TextSearch, TextSearchOptions};
use crate::descriptor::{Pagination, QueryDescriptor, SortOrder, SortSpec};
use crate::errors::BuilderError;
use crate::group::{Group, GroupItem};
use crate::join::JoinSpec;
use serde_json::Value;

fn make_condition(
    method: &'static str,
    field: &str,
    operator: Operator,
    value: Value,
) -> Result<Condition, BuilderError> {
    if field.is_empty() {
        return Err(BuilderError::EmptyField { method });
    }

    if operator.is_null_check() {
        return Ok(Condition::new(field, operator, None));
    }

    if value.is_null() {
        return Err(BuilderError::MissingValue {
            method,
            field: field.to_string(),
            operator,
        });
    }

    if operator.requires_array() && !value.is_array() {
        return Err(BuilderError::ExpectedArray {
            method,
            field: field.to_string(),
            operator,
        });
    }

    Ok(Condition::new(field, operator, Some(value)))
}

fn collect_values<I, V>(values: I) -> Value
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Value::Array(values.into_iter().map(Into::into).collect())
}

/// Query builder for constructing search descriptors
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    draft: QueryDescriptor,
    error: Option<BuilderError>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue building from an existing descriptor
    pub fn from_descriptor(descriptor: QueryDescriptor) -> Self {
        Self {
            draft: descriptor,
            error: None,
        }
    }

    fn push(mut self, condition: Result<Condition, BuilderError>) -> Self {
        if self.error.is_none() {
            match condition {
                Ok(condition) => self.draft.conditions.push(condition),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    /// Set the full-text search clause, replacing any previous one
    pub fn text_search(mut self, query: impl Into<String>, options: TextSearchOptions) -> Self {
        self.draft.text_search = Some(TextSearch::with_options(query, options));
        self
    }

    /// Add a condition combined with AND
    pub fn filter(self, field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        let condition = make_condition("filter", field, operator, value.into());
        self.push(condition)
    }

    /// Add a condition combined with OR
    pub fn or_filter(self, field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        let condition = make_condition("or_filter", field, operator, value.into())
            .map(|condition| condition.with_logic(Logic::Or));
        self.push(condition)
    }

    /// Add an already constructed condition
    pub fn condition(self, condition: Condition) -> Self {
        self.push(Ok(condition))
    }

    /// `min <= field <= max`
    pub fn filter_between(
        self,
        field: &str,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Self {
        let lower = make_condition("filter_between", field, Operator::Gte, min.into());
        let upper = make_condition("filter_between", field, Operator::Lte, max.into());
        self.push(lower).push(upper)
    }

    pub fn filter_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = make_condition("filter_in", field, Operator::In, collect_values(values));
        self.push(condition)
    }

    pub fn filter_not_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = make_condition(
            "filter_not_in",
            field,
            Operator::NotIn,
            collect_values(values),
        );
        self.push(condition)
    }

    pub fn filter_null(self, field: &str) -> Self {
        let condition = make_condition("filter_null", field, Operator::IsNull, Value::Null);
        self.push(condition)
    }

    pub fn filter_not_null(self, field: &str) -> Self {
        let condition = make_condition("filter_not_null", field, Operator::NotNull, Value::Null);
        self.push(condition)
    }

    /// Add a boolean group; the closure receives a builder scoped to the new group
    pub fn filter_group<F>(mut self, logic: Logic, build: F) -> Self
    where
        F: FnOnce(GroupBuilder) -> GroupBuilder,
    {
        if self.error.is_none() {
            match build(GroupBuilder::new(logic)).finish() {
                Ok(group) => self.draft.groups.push(group),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    /// Add ordering; applied in the order added
    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        if field.is_empty() {
            if self.error.is_none() {
                self.error = Some(BuilderError::EmptyField { method: "order_by" });
            }
            return self;
        }
        self.draft.sorting.push(SortSpec::new(field, order));
        self
    }

    pub fn paginate(mut self, page: u32, limit: u32) -> Self {
        self.draft.pagination = Some(Pagination::new(page, limit));
        self
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.draft.joins.push(join);
        self
    }

    /// Owned copy of the descriptor built so far
    pub fn build(&self) -> Result<QueryDescriptor, BuilderError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.draft.clone()),
        }
    }
}

/// Builder scoped to one group; nest further with [`GroupBuilder::group`]
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    group: Group,
    error: Option<BuilderError>,
}

impl GroupBuilder {
    pub fn new(logic: Logic) -> Self {
        Self {
            group: Group::new(logic, Vec::new()),
            error: None,
        }
    }

    fn push(mut self, condition: Result<Condition, BuilderError>) -> Self {
        if self.error.is_none() {
            match condition {
                Ok(condition) => self.group.conditions.push(GroupItem::Condition(condition)),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    pub fn filter(self, field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        let condition = make_condition("filter", field, operator, value.into());
        self.push(condition)
    }

    pub fn condition(self, condition: Condition) -> Self {
        self.push(Ok(condition))
    }

    pub fn filter_between(
        self,
        field: &str,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Self {
        let lower = make_condition("filter_between", field, Operator::Gte, min.into());
        let upper = make_condition("filter_between", field, Operator::Lte, max.into());
        self.push(lower).push(upper)
    }

    pub fn filter_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = make_condition("filter_in", field, Operator::In, collect_values(values));
        self.push(condition)
    }

    pub fn filter_null(self, field: &str) -> Self {
        let condition = make_condition("filter_null", field, Operator::IsNull, Value::Null);
        self.push(condition)
    }

    pub fn filter_not_null(self, field: &str) -> Self {
        let condition = make_condition("filter_not_null", field, Operator::NotNull, Value::Null);
        self.push(condition)
    }

    /// Nest another group inside this one
    pub fn group<F>(mut self, logic: Logic, build: F) -> Self
    where
        F: FnOnce(GroupBuilder) -> GroupBuilder,
    {
        if self.error.is_none() {
            match build(GroupBuilder::new(logic)).finish() {
                Ok(group) => self.group.conditions.push(GroupItem::Group(group)),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    fn finish(self) -> Result<Group, BuilderError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.group),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chain_builds_descriptor() {
        let descriptor = QueryBuilder::new()
            .text_search("BMW 3 Series", TextSearchOptions::default())
            .filter("make", Operator::Eq, "BMW")
            .filter_between("price", 10_000, 30_000)
            .filter_in("fuel_type", ["petrol", "diesel"])
            .order_by("price", SortOrder::Asc)
            .paginate(2, 24)
            .build()
            .unwrap();

        assert_eq!(descriptor.text_search.unwrap().query, "BMW 3 Series");
        assert_eq!(
            descriptor.conditions,
            vec![
                Condition::eq("make", "BMW"),
                Condition::gte("price", 10_000),
                Condition::lte("price", 30_000),
                Condition::in_values("fuel_type", vec![json!("petrol"), json!("diesel")]),
            ]
        );
        assert_eq!(descriptor.sorting, vec![SortSpec::asc("price")]);
        assert_eq!(descriptor.pagination, Some(Pagination::new(2, 24)));
    }

    #[test]
    fn test_or_filter_sets_logic() {
        let descriptor = QueryBuilder::new()
            .or_filter("color", Operator::Eq, "red")
            .or_filter("color", Operator::Eq, "blue")
            .build()
            .unwrap();

        assert!(descriptor
            .conditions
            .iter()
            .all(|c| c.logic == Some(Logic::Or)));
    }

    #[test]
    fn test_nested_groups() {
        let descriptor = QueryBuilder::new()
            .filter_group(Logic::Or, |g| {
                g.filter("make", Operator::Eq, "BMW").group(Logic::And, |g| {
                    g.filter("make", Operator::Eq, "Audi")
                        .group(Logic::Or, |g| g.filter("year", Operator::Gte, 2020).filter_null("accident_at"))
                })
            })
            .build()
            .unwrap();

        assert_eq!(descriptor.groups.len(), 1);
        assert_eq!(descriptor.max_group_depth(), 3);
        assert_eq!(descriptor.total_condition_count(), 4);
        assert_eq!(descriptor.groups[0].logic, Logic::Or);
    }

    #[test]
    fn test_build_returns_independent_copies() {
        let builder = QueryBuilder::new().filter("make", Operator::Eq, "BMW");
        let first = builder.build().unwrap();
        let second = builder.clone().filter("model", Operator::Eq, "M3").build().unwrap();

        assert_eq!(first.conditions.len(), 1);
        assert_eq!(second.conditions.len(), 2);
        assert_eq!(builder.build().unwrap(), first);
    }

    #[test]
    fn test_empty_field_fails_fast() {
        let err = QueryBuilder::new()
            .filter("", Operator::Eq, "BMW")
            .filter("model", Operator::Eq, "M3")
            .build()
            .unwrap_err();

        assert_eq!(err, BuilderError::EmptyField { method: "filter" });
    }

    #[test]
    fn test_scalar_for_in_is_rejected() {
        let err = QueryBuilder::new()
            .filter("make", Operator::In, "BMW")
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            BuilderError::ExpectedArray {
                method: "filter",
                field: "make".to_string(),
                operator: Operator::In,
            }
        );
        assert!(err.to_string().contains("requires an array value"));
    }

    #[test]
    fn test_missing_value_inside_group_propagates() {
        let err = QueryBuilder::new()
            .filter_group(Logic::And, |g| {
                g.group(Logic::Or, |g| g.filter("price", Operator::Gt, Value::Null))
            })
            .build()
            .unwrap_err();

        assert!(matches!(err, BuilderError::MissingValue { field, .. } if field == "price"));
    }

    #[test]
    fn test_null_check_discards_value() {
        let descriptor = QueryBuilder::new()
            .filter("sold_at", Operator::IsNull, "ignored")
            .build()
            .unwrap();

        assert_eq!(descriptor.conditions, vec![Condition::is_null("sold_at")]);
    }

    #[test]
    fn test_order_by_empty_field() {
        let err = QueryBuilder::new()
            .order_by("", SortOrder::Desc)
            .build()
            .unwrap_err();
        assert_eq!(err, BuilderError::EmptyField { method: "order_by" });
    }
}
