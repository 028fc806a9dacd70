//! PostgreSQL data source
//!
//! Builds parameterized SQL from fetch and count requests and selects each
//! row as `jsonb`. Plain comparisons are bound as parameters; pre-rendered
//! clauses come from [`SqlAdapter`] with inline literals.

use crate::adapter::{quote_identifier, quote_literal, sql_comparison, FilterAdapter, SqlAdapter};
use crate::errors::DataSourceError;
use crate::source::{CountRequest, DataSource, FetchRequest, FilterOp, Row};
use async_trait::async_trait;
use config::DatabaseConfig;
use query_model::condition::{Condition, Operator, TextSearchType};
use query_model::identifiers::{ValidatedFieldName, ValidatedTableName};
use query_model::join::JoinSpec;
use serde_json::Value;
use sqlx::{PgPool, Row as _};
use std::time::Duration;

const BASE_ALIAS: &str = "base";

// Shared parameter binding for JSON values
macro_rules! bind_json_param {
    ($query:expr, $param:expr) => {
        match $param {
            serde_json::Value::String(s) => {
                // Try to parse as RFC3339 timestamp first
                if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&s) {
                    $query.bind(dt.with_timezone(&chrono::Utc))
                // Try to parse as UUID
                } else if let Ok(uuid) = uuid::Uuid::parse_str(&s) {
                    $query.bind(uuid)
                } else {
                    $query.bind(s)
                }
            }
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                        $query.bind(i as i32)
                    } else {
                        $query.bind(i)
                    }
                } else if let Some(f) = n.as_f64() {
                    $query.bind(f)
                } else {
                    $query.bind(n.to_string())
                }
            }
            serde_json::Value::Bool(b) => $query.bind(b),
            serde_json::Value::Null => $query.bind(Option::<String>::None),
            other => $query.bind(other.to_string()),
        }
    };
}

#[derive(Debug, Clone)]
pub struct PgDataSource {
    pool: PgPool,
    adapter: SqlAdapter,
}

impl PgDataSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            adapter: SqlAdapter::new(),
        }
    }

    /// Open a pool from connection settings
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataSourceError> {
        let mut pool_options = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        if config.max_lifetime_seconds > 0 {
            pool_options =
                pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        }

        let pool = pool_options.connect(&config.connection_string()).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_rows(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, DataSourceError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_json_param!(query, param);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(DataSourceError::from))
            .collect()
    }
}

/// Accumulates SQL parameters and hands out `$n` placeholders
#[derive(Debug, Default)]
struct Params {
    values: Vec<Value>,
}

impl Params {
    fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

fn table_ident(table: &str) -> Result<String, DataSourceError> {
    let table = ValidatedTableName::new(table)
        .map_err(|err| DataSourceError::InvalidRequest(err.to_string()))?;
    Ok(quote_identifier(table.as_str()))
}

fn field_ident(adapter: &SqlAdapter, field: &str) -> Result<String, DataSourceError> {
    let field = ValidatedFieldName::new(field)
        .map_err(|err| DataSourceError::InvalidRequest(err.to_string()))?;
    Ok(adapter.quote_field(&field))
}

fn render_condition(
    adapter: &SqlAdapter,
    condition: &Condition,
    params: &mut Params,
) -> Result<String, DataSourceError> {
    let operator = condition.operator;
    let bindable = matches!(
        operator,
        Operator::Eq
            | Operator::Neq
            | Operator::Gt
            | Operator::Gte
            | Operator::Lt
            | Operator::Lte
            | Operator::Like
            | Operator::Ilike
            | Operator::In
            | Operator::NotIn
    );

    if !bindable {
        return adapter
            .render_condition(condition)
            .map_err(|err| DataSourceError::InvalidRequest(err.to_string()));
    }

    let field = field_ident(adapter, &condition.field)?;

    if let Some(values) = condition.array_values() {
        if !matches!(operator, Operator::In | Operator::NotIn) {
            return Err(DataSourceError::InvalidRequest(format!(
                "Operator '{}' on '{}' requires a scalar value",
                operator, condition.field
            )));
        }
        if values.is_empty() {
            let always = if operator == Operator::In { "1=0" } else { "1=1" };
            return Ok(always.to_string());
        }
        let placeholders = values
            .iter()
            .map(|value| params.push(value.clone()))
            .collect::<Vec<_>>()
            .join(", ");
        return Ok(format!("{} {} ({})", field, sql_comparison(operator), placeholders));
    }

    match &condition.value {
        Some(value) if !value.is_null() && !matches!(operator, Operator::In | Operator::NotIn) => {
            let placeholder = params.push(value.clone());
            Ok(format!("{} {} {}", field, sql_comparison(operator), placeholder))
        }
        _ => Err(DataSourceError::InvalidRequest(format!(
            "Operator '{}' on '{}' has no usable value",
            operator, condition.field
        ))),
    }
}

fn where_clause(
    adapter: &SqlAdapter,
    filters: &[FilterOp],
    params: &mut Params,
) -> Result<String, DataSourceError> {
    let mut parts = Vec::with_capacity(filters.len());

    for filter in filters {
        let part = match filter {
            FilterOp::Condition(condition) => render_condition(adapter, condition, params)?,
            FilterOp::Clause { clause, .. } => clause.clone(),
            FilterOp::TextSearch {
                column,
                query,
                search_type,
                config,
            } => {
                let function = match search_type {
                    TextSearchType::Websearch => "websearch_to_tsquery",
                    TextSearchType::Plainto => "plainto_tsquery",
                    TextSearchType::Phraseto | TextSearchType::Phrase => "phraseto_tsquery",
                };
                let placeholder = params.push(Value::String(query.clone()));
                format!(
                    "{} @@ {}({}, {})",
                    field_ident(adapter, column)?,
                    function,
                    quote_literal(config.as_str()),
                    placeholder
                )
            }
        };
        parts.push(part);
    }

    if parts.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }
}

fn join_clause(adapter: &SqlAdapter, join: &JoinSpec) -> Result<(String, String), DataSourceError> {
    let table = table_ident(&join.table)?;
    let reference = quote_identifier(join.table_ref());
    let on = join.on.as_ref().ok_or_else(|| {
        DataSourceError::InvalidRequest(format!("Join on '{}' requires join keys", join.table))
    })?;
    let local = field_ident(adapter, &on.local_field)?;
    let foreign = field_ident(adapter, &on.foreign_field)?;

    let sql = format!(
        " {} {} AS {} ON {}.{} = {}.{}",
        join.join_type.to_sql(),
        table,
        reference,
        BASE_ALIAS,
        local,
        reference,
        foreign
    );

    let embedded = if join.columns.is_empty() {
        format!("to_jsonb({})", reference)
    } else {
        let mut pairs = Vec::with_capacity(join.columns.len());
        for column in &join.columns {
            pairs.push(format!(
                "{}, {}.{}",
                quote_literal(column),
                reference,
                field_ident(adapter, column)?
            ));
        }
        format!("jsonb_build_object({})", pairs.join(", "))
    };
    let projection = format!(
        "jsonb_build_object({}, {})",
        quote_literal(join.table_ref()),
        embedded
    );

    Ok((sql, projection))
}

/// SQL and parameters for a fetch request
pub fn select_sql(request: &FetchRequest) -> Result<(String, Vec<Value>), DataSourceError> {
    let adapter = SqlAdapter::new();
    let mut params = Params::default();

    let mut projection = format!("to_jsonb({})", BASE_ALIAS);
    let mut joins = String::new();
    for join in &request.joins {
        let (sql, embedded) = join_clause(&adapter, join)?;
        joins.push_str(&sql);
        projection.push_str(" || ");
        projection.push_str(&embedded);
    }

    let mut sql = format!(
        "SELECT {} AS row FROM {} AS {}{}",
        projection,
        table_ident(&request.table)?,
        BASE_ALIAS,
        joins
    );
    sql.push_str(&where_clause(&adapter, &request.filters, &mut params)?);

    if !request.order.is_empty() {
        let mut order = Vec::with_capacity(request.order.len());
        for sort in &request.order {
            order.push(format!(
                "{} {}",
                field_ident(&adapter, &sort.field)?,
                sort.order.to_sql()
            ));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }

    if let Some((offset, limit)) = request.offset_limit() {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    }

    Ok((sql, params.values))
}

/// SQL and parameters for a count request
pub fn count_sql(request: &CountRequest) -> Result<(String, Vec<Value>), DataSourceError> {
    let adapter = SqlAdapter::new();
    let mut params = Params::default();

    let mut joins = String::new();
    for join in &request.joins {
        let (sql, _) = join_clause(&adapter, join)?;
        joins.push_str(&sql);
    }

    let mut sql = format!(
        "SELECT COUNT(*) AS total FROM {} AS {}{}",
        table_ident(&request.table)?,
        BASE_ALIAS,
        joins
    );
    sql.push_str(&where_clause(&adapter, &request.filters, &mut params)?);

    Ok((sql, params.values))
}

#[async_trait]
impl DataSource for PgDataSource {
    fn adapter(&self) -> &dyn FilterAdapter {
        &self.adapter
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Row>, DataSourceError> {
        let (sql, params) = select_sql(request)?;
        self.run_rows(&sql, params).await
    }

    async fn count(&self, request: &CountRequest) -> Result<u64, DataSourceError> {
        let (sql, params) = count_sql(request)?;

        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_json_param!(query, param);
        }

        let row = query.fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        u64::try_from(total).map_err(|_| DataSourceError::Decode(format!("Negative count: {}", total)))
    }

    async fn health_check(&self) -> Result<(), DataSourceError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_model::condition::{Logic, TextSearchConfig};
    use query_model::descriptor::SortSpec;
    use serde_json::json;

    fn request() -> FetchRequest {
        FetchRequest::new("car_listings")
    }

    #[test]
    fn test_plain_select() {
        let (sql, params) = select_sql(&request()).unwrap();

        assert_eq!(sql, r#"SELECT to_jsonb(base) AS row FROM "car_listings" AS base"#);
        assert!(params.is_empty());
    }

    #[test]
    fn test_conditions_are_bound() {
        let mut request = request();
        request.filters = vec![
            FilterOp::Condition(Condition::eq("make", "BMW")),
            FilterOp::Condition(Condition::in_values("year", vec![json!(2019), json!(2020)])),
            FilterOp::Condition(Condition::is_null("sold_at")),
        ];
        request.order = vec![SortSpec::desc("price")];
        request.range = Some((24, 35));

        let (sql, params) = select_sql(&request).unwrap();

        assert_eq!(
            sql,
            r#"SELECT to_jsonb(base) AS row FROM "car_listings" AS base WHERE "make" = $1 AND "year" IN ($2, $3) AND "sold_at" IS NULL ORDER BY "price" DESC LIMIT 12 OFFSET 24"#
        );
        assert_eq!(params, vec![json!("BMW"), json!(2019), json!(2020)]);
    }

    #[test]
    fn test_clause_and_text_search() {
        let mut request = request();
        request.filters = vec![
            FilterOp::Clause {
                logic: Logic::Or,
                clause: r#"("make" = 'BMW' OR "make" = 'Audi')"#.to_string(),
            },
            FilterOp::TextSearch {
                column: "search_vector".to_string(),
                query: "m sport".to_string(),
                search_type: TextSearchType::Plainto,
                config: TextSearchConfig::Simple,
            },
        ];

        let (sql, params) = select_sql(&request).unwrap();

        assert!(sql.ends_with(
            r#"WHERE ("make" = 'BMW' OR "make" = 'Audi') AND "search_vector" @@ plainto_tsquery('simple', $1)"#
        ));
        assert_eq!(params, vec![json!("m sport")]);
    }

    #[test]
    fn test_joins_are_embedded() {
        let mut request = request();
        request.joins = vec![JoinSpec::left("dealers")
            .with_alias("dealer")
            .with_columns(["name"])
            .on("dealer_id", "id")];

        let (sql, _) = select_sql(&request).unwrap();

        assert_eq!(
            sql,
            r#"SELECT to_jsonb(base) || jsonb_build_object('dealer', jsonb_build_object('name', "dealer"."name")) AS row FROM "car_listings" AS base LEFT JOIN "dealers" AS "dealer" ON base."dealer_id" = "dealer"."id""#
        );
    }

    #[test]
    fn test_join_without_keys_is_rejected() {
        let mut request = request();
        request.joins = vec![JoinSpec::inner("dealers")];

        assert!(matches!(
            select_sql(&request),
            Err(DataSourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_count_sql_ignores_order() {
        let request = CountRequest {
            table: "car_listings".to_string(),
            joins: Vec::new(),
            filters: vec![FilterOp::Condition(Condition::gte("year", 2015))],
        };

        let (sql, params) = count_sql(&request).unwrap();

        assert_eq!(
            sql,
            r#"SELECT COUNT(*) AS total FROM "car_listings" AS base WHERE "year" >= $1"#
        );
        assert_eq!(params, vec![json!(2015)]);
    }

    #[test]
    fn test_count_sql_keeps_joins() {
        let mut request = request();
        request.joins = vec![JoinSpec::inner("dealers")
            .with_alias("dealer")
            .with_columns(["name", "city"])
            .on("dealer_id", "id")];
        request.filters = vec![FilterOp::Condition(Condition::eq("dealer.city", "Leeds"))];
        request.order = vec![SortSpec::asc("price")];
        request.range = Some((0, 11));

        let (fetch, _) = select_sql(&request).unwrap();
        let (count, params) = count_sql(&CountRequest::from(&request)).unwrap();

        assert!(fetch.contains(r#"INNER JOIN "dealers" AS "dealer""#));
        assert_eq!(
            count,
            r#"SELECT COUNT(*) AS total FROM "car_listings" AS base INNER JOIN "dealers" AS "dealer" ON base."dealer_id" = "dealer"."id" WHERE "dealer"."city" = $1"#
        );
        assert_eq!(params, vec![json!("Leeds")]);
    }

    #[test]
    fn test_invalid_table_is_rejected() {
        let request = FetchRequest::new("car_listings; DROP TABLE users");
        assert!(select_sql(&request).is_err());
    }
}
