//! Backend filter grammars
//!
//! A [`FilterAdapter`] renders single conditions and boolean combinations in
//! the syntax a data source understands. Group clauses are produced with the
//! shared [`fold_group`] walk, so every backend flattens nesting the same way.

use crate::errors::TranslationError;
use query_model::clause::{fold_group, GroupPath};
use query_model::condition::{Condition, Logic, Operator};
use query_model::group::Group;
use query_model::identifiers::ValidatedFieldName;
use serde_json::Value;

pub trait FilterAdapter: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Render one condition as a standalone clause
    fn render_condition(&self, condition: &Condition) -> Result<String, TranslationError>;

    /// Combine rendered clauses under one logic
    fn combine(&self, logic: Logic, parts: &[String]) -> String;

    /// Render a whole group, nested groups included
    fn render_group(&self, group: &Group, path: &GroupPath) -> Result<String, TranslationError> {
        fold_group(
            group,
            path,
            &mut |path: &GroupPath, position: usize, condition: &Condition| {
                self.render_condition(condition)
                    .map_err(|err| err.at(format!("{}, Condition {}", path, position)))
            },
            &mut |path: &GroupPath, group: &Group, children: Vec<Result<String, TranslationError>>| {
                let parts = children.into_iter().collect::<Result<Vec<_>, _>>()?;
                if parts.is_empty() {
                    return Err(TranslationError::EmptyGroup(path.to_string()));
                }
                Ok(self.combine(group.logic, &parts))
            },
        )
    }
}

fn checked_field(condition: &Condition) -> Result<ValidatedFieldName, TranslationError> {
    ValidatedFieldName::new(&condition.field).map_err(|err| TranslationError::InvalidField {
        field: condition.field.clone(),
        reason: err.to_string(),
    })
}

fn unsupported(condition: &Condition, reason: &str) -> TranslationError {
    TranslationError::UnsupportedValue {
        field: condition.field.clone(),
        operator: condition.operator,
        reason: reason.to_string(),
    }
}

fn required_value<'a>(condition: &'a Condition) -> Result<&'a Value, TranslationError> {
    match &condition.value {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(unsupported(condition, "a value is required")),
    }
}

fn required_array<'a>(condition: &'a Condition) -> Result<&'a [Value], TranslationError> {
    condition
        .array_values()
        .ok_or_else(|| unsupported(condition, "an array value is required"))
}

// ========================================
// PostgREST grammar
// ========================================

/// PostgREST filter syntax: `field.op.value`, `and(..)`, `or(..)`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgrestAdapter;

const POSTGREST_RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\'];
const POSTGREST_ARRAY_RESERVED: &[char] = &[',', '{', '}', '"', '\\', ' '];

impl PostgrestAdapter {
    pub fn new() -> Self {
        Self
    }

    /// The `op.value` part of a condition, as sent in a top-level
    /// `field=op.value` query parameter. Scalars are sent verbatim there;
    /// PostgREST only unquotes values inside lists and logic trees.
    pub fn render_filter_value(&self, condition: &Condition) -> Result<String, TranslationError> {
        self.render_value(condition, false)
    }

    fn render_value(&self, condition: &Condition, nested: bool) -> Result<String, TranslationError> {
        checked_field(condition)?;

        let operator = condition.operator;
        let rendered = match operator {
            Operator::IsNull => "is.null".to_string(),
            Operator::NotNull => "not.is.null".to_string(),
            Operator::In => format!("in.({})", self.list(required_array(condition)?)),
            Operator::NotIn => format!("not.in.({})", self.list(required_array(condition)?)),
            Operator::Overlaps => format!("ov.{}", self.array_literal(required_array(condition)?)),
            Operator::Contains | Operator::ContainedBy => {
                let prefix = if operator == Operator::Contains { "cs" } else { "cd" };
                match required_value(condition)? {
                    Value::Array(values) => format!("{}.{}", prefix, self.array_literal(values)),
                    object @ Value::Object(_) => format!("{}.{}", prefix, object),
                    _ => return Err(unsupported(condition, "an array or object value is required")),
                }
            }
            _ => {
                let value = required_value(condition)?;
                if value.is_array() || value.is_object() {
                    return Err(unsupported(condition, "a scalar value is required"));
                }
                let value = match value {
                    Value::String(s) if !nested => s.clone(),
                    other => self.scalar(other),
                };
                format!("{}.{}", operator.as_str(), value)
            }
        };
        Ok(rendered)
    }

    /// Split a rendered root clause into its query parameter, e.g. `or(a,b)` into `("or", "(a,b)")`
    pub fn clause_param<'a>(&self, logic: Logic, clause: &'a str) -> Option<(&'static str, &'a str)> {
        let key = postgrest_logic(logic);
        clause
            .strip_prefix(key)
            .filter(|rest| rest.starts_with('(') && rest.ends_with(')'))
            .map(|rest| (key, rest))
    }

    fn scalar(&self, value: &Value) -> String {
        match value {
            Value::String(s) => quote_if(s, POSTGREST_RESERVED, s.trim() != s.as_str()),
            other => other.to_string(),
        }
    }

    fn list(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|value| self.scalar(value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `{a,b}` array literal
    fn array_literal(&self, values: &[Value]) -> String {
        let items = values
            .iter()
            .map(|value| match value {
                Value::String(s) => quote_if(s, POSTGREST_ARRAY_RESERVED, s.is_empty()),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("{{{}}}", items)
    }
}

fn postgrest_logic(logic: Logic) -> &'static str {
    match logic {
        Logic::And => "and",
        Logic::Or => "or",
    }
}

/// Double-quote `raw` when it contains a reserved character
fn quote_if(raw: &str, reserved: &[char], force: bool) -> String {
    if !force && !raw.contains(reserved) {
        return raw.to_string();
    }
    let escaped = raw.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

impl FilterAdapter for PostgrestAdapter {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    fn render_condition(&self, condition: &Condition) -> Result<String, TranslationError> {
        Ok(format!(
            "{}.{}",
            condition.field,
            self.render_value(condition, true)?
        ))
    }

    fn combine(&self, logic: Logic, parts: &[String]) -> String {
        format!("{}({})", postgrest_logic(logic), parts.join(","))
    }
}

// ========================================
// SQL grammar
// ========================================

/// PostgreSQL boolean expressions with inline, escaped literals
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlAdapter;

impl SqlAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `"a"."b"` from a dotted field name
    pub fn quote_field(&self, field: &ValidatedFieldName) -> String {
        field
            .segments()
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// SQL literal for a JSON value
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_literal(s),
            Value::Array(_) | Value::Object(_) => format!("{}::jsonb", quote_literal(&value.to_string())),
        }
    }

    fn array_literal(&self, values: &[Value]) -> String {
        let items = values
            .iter()
            .map(|value| self.literal(value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ARRAY[{}]", items)
    }

    fn list(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|value| self.literal(value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

impl FilterAdapter for SqlAdapter {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn render_condition(&self, condition: &Condition) -> Result<String, TranslationError> {
        let field = self.quote_field(&checked_field(condition)?);

        let sql = match condition.operator {
            Operator::IsNull => format!("{} IS NULL", field),
            Operator::NotNull => format!("{} IS NOT NULL", field),
            Operator::In => {
                let values = required_array(condition)?;
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                format!("{} IN ({})", field, self.list(values))
            }
            Operator::NotIn => {
                let values = required_array(condition)?;
                if values.is_empty() {
                    return Ok("1=1".to_string());
                }
                format!("{} NOT IN ({})", field, self.list(values))
            }
            Operator::Overlaps => {
                let values = required_array(condition)?;
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                format!("{} && {}", field, self.array_literal(values))
            }
            Operator::Contains | Operator::ContainedBy => {
                let symbol = if condition.operator == Operator::Contains { "@>" } else { "<@" };
                match required_value(condition)? {
                    Value::Array(values) => {
                        format!("{} {} {}", field, symbol, self.array_literal(values))
                    }
                    object @ Value::Object(_) => {
                        format!("{} {} {}", field, symbol, self.literal(object))
                    }
                    _ => return Err(unsupported(condition, "an array or object value is required")),
                }
            }
            operator => {
                let value = required_value(condition)?;
                if value.is_array() || value.is_object() {
                    return Err(unsupported(condition, "a scalar value is required"));
                }
                format!("{} {} {}", field, sql_comparison(operator), self.literal(value))
            }
        };
        Ok(sql)
    }

    fn combine(&self, logic: Logic, parts: &[String]) -> String {
        let joiner = match logic {
            Logic::And => " AND ",
            Logic::Or => " OR ",
        };
        format!("({})", parts.join(joiner))
    }
}

pub(crate) fn sql_comparison(operator: Operator) -> &'static str {
    match operator {
        Operator::Eq => "=",
        Operator::Neq => "<>",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Like => "LIKE",
        Operator::Ilike => "ILIKE",
        Operator::In => "IN",
        Operator::NotIn => "NOT IN",
        Operator::IsNull => "IS NULL",
        Operator::NotNull => "IS NOT NULL",
        Operator::Contains => "@>",
        Operator::ContainedBy => "<@",
        Operator::Overlaps => "&&",
    }
}
