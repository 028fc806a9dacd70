use serde::{Deserialize, Serialize};

/// Represents the type of join with a related table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Only rows that have a matching related row
    Inner,
    /// All rows, related data when present
    #[default]
    Left,
}

impl JoinType {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// Key pair relating the base table to the joined table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOn {
    pub local_field: String,
    pub foreign_field: String,
}

/// Request to include a related table in the results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    #[serde(default, rename = "type")]
    pub join_type: JoinType,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Columns to include; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Explicit key pair; REST backends infer it from foreign keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<JoinOn>,
}

impl JoinSpec {
    pub fn new(join_type: JoinType, table: impl Into<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            alias: None,
            columns: Vec::new(),
            on: None,
        }
    }

    pub fn inner(table: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, table)
    }

    pub fn left(table: impl Into<String>) -> Self {
        Self::new(JoinType::Left, table)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn on(mut self, local_field: impl Into<String>, foreign_field: impl Into<String>) -> Self {
        self.on = Some(JoinOn {
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
        });
        self
    }

    /// Get the table reference (alias if present, otherwise table name)
    pub fn table_ref(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_spec_builders() {
        let join = JoinSpec::inner("dealers")
            .with_alias("dealer")
            .with_columns(["name", "city"])
            .on("dealer_id", "id");

        assert_eq!(join.join_type, JoinType::Inner);
        assert_eq!(join.table_ref(), "dealer");
        assert_eq!(join.columns, vec!["name", "city"]);
        assert_eq!(
            join.on,
            Some(JoinOn {
                local_field: "dealer_id".to_string(),
                foreign_field: "id".to_string(),
            })
        );
    }

    #[test]
    fn test_table_ref_without_alias() {
        assert_eq!(JoinSpec::left("listing_photos").table_ref(), "listing_photos");
    }

    #[test]
    fn test_join_type_defaults_to_left() {
        let join: JoinSpec = serde_json::from_value(json!({"table": "dealers"})).unwrap();
        assert_eq!(join.join_type, JoinType::Left);
        assert_eq!(join.join_type.to_sql(), "LEFT JOIN");
    }
}
