//! Filter conditions
//!
//! A condition is a single `field operator value` predicate. Text search
//! clauses live here as well since they are the other leaf of a query.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,          // =
    Neq,         // !=
    Gt,          // >
    Gte,         // >=
    Lt,          // <
    Lte,         // <=
    Like,        // LIKE
    Ilike,       // ILIKE (case insensitive)
    In,          // IN
    NotIn,       // NOT IN
    IsNull,      // IS NULL
    NotNull,     // IS NOT NULL
    Contains,    // @>
    ContainedBy, // <@
    Overlaps,    // &&
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::IsNull => "is_null",
            Operator::NotNull => "not_null",
            Operator::Contains => "contains",
            Operator::ContainedBy => "contained_by",
            Operator::Overlaps => "overlaps",
        }
    }

    /// `is_null` / `not_null` take no value
    pub fn is_null_check(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::NotNull)
    }

    /// Operators whose value must be a JSON array
    pub fn requires_array(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn | Operator::Overlaps)
    }

    /// Containment operators accept an array or a JSON object
    pub fn is_containment(&self) -> bool {
        matches!(self, Operator::Contains | Operator::ContainedBy)
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Operator::Like | Operator::Ilike)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical operators for combining conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    /// None for IS NULL / IS NOT NULL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// How a flat condition combines with its siblings; unset means AND
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Logic>,
}

impl Condition {
    /// Create a simple condition
    pub fn new(field: &str, operator: Operator, value: Option<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
            logic: None,
        }
    }

    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = Some(logic);
        self
    }

    /// Logic used when combining with sibling conditions
    pub fn effective_logic(&self) -> Logic {
        self.logic.unwrap_or_default()
    }

    /// A JSON `null` counts as no value
    pub fn has_value(&self) -> bool {
        matches!(&self.value, Some(value) if !value.is_null())
    }

    /// Values of an array-valued condition
    pub fn array_values(&self) -> Option<&[Value]> {
        match &self.value {
            Some(Value::Array(values)) => Some(values),
            _ => None,
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, Some(value.into()))
    }

    pub fn neq(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Neq, Some(value.into()))
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gt, Some(value.into()))
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gte, Some(value.into()))
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lt, Some(value.into()))
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lte, Some(value.into()))
    }

    pub fn like(field: &str, pattern: &str) -> Self {
        Self::new(field, Operator::Like, Some(Value::String(pattern.to_string())))
    }

    pub fn ilike(field: &str, pattern: &str) -> Self {
        Self::new(field, Operator::Ilike, Some(Value::String(pattern.to_string())))
    }

    pub fn in_values(field: &str, values: Vec<Value>) -> Self {
        Self::new(field, Operator::In, Some(Value::Array(values)))
    }

    pub fn not_in_values(field: &str, values: Vec<Value>) -> Self {
        Self::new(field, Operator::NotIn, Some(Value::Array(values)))
    }

    pub fn is_null(field: &str) -> Self {
        Self::new(field, Operator::IsNull, None)
    }

    pub fn not_null(field: &str) -> Self {
        Self::new(field, Operator::NotNull, None)
    }

    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Contains, Some(value.into()))
    }

    pub fn contained_by(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::ContainedBy, Some(value.into()))
    }

    pub fn overlaps(field: &str, values: Vec<Value>) -> Self {
        Self::new(field, Operator::Overlaps, Some(Value::Array(values)))
    }
}

/// Full-text query parser flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSearchType {
    #[default]
    Websearch,
    Plainto,
    Phraseto,
    /// Alias of `Phraseto`
    Phrase,
}

/// Text search configuration (dictionary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSearchConfig {
    #[default]
    English,
    Simple,
}

impl TextSearchConfig {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextSearchConfig::English => "english",
            TextSearchConfig::Simple => "simple",
        }
    }
}

/// Full-text search clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSearch {
    pub query: String,
    /// When set, search these columns with pattern matching instead of the search vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, rename = "type")]
    pub search_type: TextSearchType,
    #[serde(default)]
    pub config: TextSearchConfig,
}

impl TextSearch {
    pub fn new(query: impl Into<String>) -> Self {
        Self::with_options(query, TextSearchOptions::default())
    }

    pub fn with_options(query: impl Into<String>, options: TextSearchOptions) -> Self {
        Self {
            query: query.into(),
            fields: options.fields,
            search_type: options.search_type,
            config: options.config,
        }
    }
}

/// Optional settings for a text search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextSearchOptions {
    pub fields: Option<Vec<String>>,
    pub search_type: TextSearchType,
    pub config: TextSearchConfig,
}

impl TextSearchOptions {
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn search_type(mut self, search_type: TextSearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn config(mut self, config: TextSearchConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_wire_names() {
        assert_eq!(serde_json::to_value(Operator::NotIn).unwrap(), json!("not_in"));
        assert_eq!(
            serde_json::from_value::<Operator>(json!("contained_by")).unwrap(),
            Operator::ContainedBy
        );
        assert!(serde_json::from_value::<Operator>(json!("between")).is_err());
    }

    #[test]
    fn test_condition_deserializes_without_value() {
        let condition: Condition =
            serde_json::from_value(json!({"field": "sold_at", "operator": "is_null"})).unwrap();

        assert_eq!(condition, Condition::is_null("sold_at"));
        assert!(!condition.has_value());
        assert_eq!(condition.effective_logic(), Logic::And);
    }

    #[test]
    fn test_null_value_counts_as_missing() {
        let condition = Condition::new("make", Operator::Eq, Some(Value::Null));
        assert!(!condition.has_value());
        assert!(Condition::eq("make", "BMW").has_value());
    }

    #[test]
    fn test_logic_serializes_uppercase() {
        let condition = Condition::eq("make", "Audi").with_logic(Logic::Or);
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["logic"], json!("OR"));
    }

    #[test]
    fn test_text_search_defaults() {
        let search: TextSearch = serde_json::from_value(json!({"query": "BMW 3 Series"})).unwrap();

        assert_eq!(search.search_type, TextSearchType::Websearch);
        assert_eq!(search.config, TextSearchConfig::English);
        assert_eq!(search.fields, None);

        let search = TextSearch::with_options(
            "diesel",
            TextSearchOptions::default()
                .fields(["title", "description"])
                .config(TextSearchConfig::Simple),
        );
        assert_eq!(
            search.fields,
            Some(vec!["title".to_string(), "description".to_string()])
        );
        assert_eq!(search.config.as_str(), "simple");
    }
}
