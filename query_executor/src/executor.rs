//! Query execution
//!
//! The [`Executor`] validates a descriptor, translates it into filter
//! operations for its data source, then fetches the page and its total count
//! concurrently. Partial failure (rows without a count) is not an error.

use crate::adapter::FilterAdapter;
use crate::errors::{QueryError, TranslationError};
use crate::source::{CountRequest, DataSource, FetchRequest, FilterOp, Row};
use cache_system::SearchCache;
use config::QueryConfig;
use query_model::clause::GroupPath;
use query_model::condition::{Condition, Logic, TextSearch};
use query_model::descriptor::{QueryDescriptor, SortSpec};
use query_model::validation::{QueryValidator, ValidationLimits, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Rows and metadata returned for one search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub data: Vec<Row>,
    /// Total matching rows; `None` when the count could not be obtained
    pub count: Option<u64>,
    pub validation: ValidationResult,
    pub execution_time_ms: f64,
}

/// Requests a descriptor translates to
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub fetch: FetchRequest,
    /// Present when the descriptor is paginated
    pub count: Option<CountRequest>,
}

/// Cached form of a result page
#[derive(Debug, Serialize, Deserialize)]
struct CachedPage {
    data: Vec<Row>,
    count: Option<u64>,
}

pub struct Executor {
    source: Arc<dyn DataSource>,
    validator: QueryValidator,
    cache: Option<Arc<dyn SearchCache>>,
    table: String,
    search_column: String,
    boost_field: String,
    popularity_field: String,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("adapter", &self.source.adapter().name())
            .field("table", &self.table)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl Executor {
    pub fn new(source: Arc<dyn DataSource>, config: &QueryConfig) -> Self {
        Self {
            source,
            validator: QueryValidator::new(ValidationLimits::from(config)),
            cache: None,
            table: config.table.clone(),
            search_column: config.search_column.clone(),
            boost_field: config.boost_field.clone(),
            popularity_field: config.popularity_field.clone(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SearchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Target another table with the same settings
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Translate a descriptor into fetch and count requests.
    ///
    /// AND conditions are applied directly, all OR conditions form a single
    /// clause, and every group becomes its own clause. Does not validate.
    pub fn translate(&self, descriptor: &QueryDescriptor) -> Result<TranslatedQuery, TranslationError> {
        let adapter = self.source.adapter();
        let mut filters = Vec::new();
        let mut or_parts = Vec::new();

        for (index, condition) in descriptor.conditions.iter().enumerate() {
            let rendered = adapter
                .render_condition(condition)
                .map_err(|err| err.at(format!("Condition {}", index + 1)))?;
            match condition.effective_logic() {
                Logic::And => filters.push(FilterOp::Condition(condition.clone())),
                Logic::Or => or_parts.push(rendered),
            }
        }

        if !or_parts.is_empty() {
            filters.push(FilterOp::Clause {
                logic: Logic::Or,
                clause: adapter.combine(Logic::Or, &or_parts),
            });
        }

        for (index, group) in descriptor.groups.iter().enumerate() {
            let clause = adapter.render_group(group, &GroupPath::root(index + 1))?;
            filters.push(FilterOp::Clause {
                logic: group.logic,
                clause,
            });
        }

        if let Some(text_search) = &descriptor.text_search {
            filters.push(self.text_search_filter(adapter, text_search)?);
        }

        let order = if descriptor.sorting.is_empty() && descriptor.text_search.is_some() {
            vec![
                SortSpec::desc(self.boost_field.as_str()),
                SortSpec::desc(self.popularity_field.as_str()),
            ]
        } else {
            descriptor.sorting.clone()
        };

        let fetch = FetchRequest {
            table: self.table.clone(),
            joins: descriptor.joins.clone(),
            filters,
            order,
            range: descriptor.pagination.map(|pagination| pagination.range()),
        };
        let count = descriptor
            .pagination
            .map(|_| CountRequest::from(&fetch));

        debug_log!(
            "translated descriptor for {} via {}: {} filter ops",
            self.table,
            adapter.name(),
            fetch.filters.len()
        );

        Ok(TranslatedQuery { fetch, count })
    }

    fn text_search_filter(
        &self,
        adapter: &dyn FilterAdapter,
        text_search: &TextSearch,
    ) -> Result<FilterOp, TranslationError> {
        let query = text_search.query.trim();

        match &text_search.fields {
            Some(fields) if !fields.is_empty() => {
                let pattern = format!("%{}%", query);
                let mut parts = Vec::with_capacity(fields.len());
                for field in fields {
                    let rendered = adapter
                        .render_condition(&Condition::ilike(field, &pattern))
                        .map_err(|err| err.at("Text search"))?;
                    parts.push(rendered);
                }
                Ok(FilterOp::Clause {
                    logic: Logic::Or,
                    clause: adapter.combine(Logic::Or, &parts),
                })
            }
            _ => Ok(FilterOp::TextSearch {
                column: self.search_column.clone(),
                query: query.to_string(),
                search_type: text_search.search_type,
                config: text_search.config,
            }),
        }
    }

    /// Validate, translate and run a descriptor
    pub async fn execute(&self, descriptor: &QueryDescriptor) -> Result<ExecutionResult, QueryError> {
        let execution_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "query_execution",
            %execution_id,
            table = %self.table,
            adapter = self.source.adapter().name()
        );

        self.execute_inner(descriptor).instrument(span).await
    }

    async fn execute_inner(&self, descriptor: &QueryDescriptor) -> Result<ExecutionResult, QueryError> {
        let validation = self.validator.validate(descriptor);
        if !validation.is_valid {
            debug_log!("rejected invalid descriptor: {:?}", validation.errors);
            return Err(QueryError::Validation {
                errors: validation.errors,
            });
        }

        let translated = self.translate(descriptor)?;
        let cache_key = self.cache_key(descriptor);

        let started = Instant::now();

        if let Some(page) = self.cached_page(cache_key.as_deref()).await {
            debug_log!("cache hit for {}", self.table);
            return Ok(ExecutionResult {
                data: page.data,
                count: page.count,
                validation,
                execution_time_ms: elapsed_ms(started),
            });
        }

        let (rows, count) = match &translated.count {
            Some(count_request) => {
                let (rows, count) = tokio::join!(
                    self.source.fetch(&translated.fetch),
                    self.source.count(count_request)
                );
                (rows, Some(count))
            }
            None => (self.source.fetch(&translated.fetch).await, None),
        };
        let execution_time_ms = elapsed_ms(started);

        let data = rows.map_err(|err| {
            tracing::error!(error = %err, "fetch failed");
            QueryError::execution(&self.table, err)
        })?;

        let count = match count {
            Some(Ok(total)) => Some(total),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "count failed; returning rows without a total");
                None
            }
            None => Some(data.len() as u64),
        };

        if let Some(key) = cache_key.as_deref() {
            self.store_page(key, &data, count).await;
        }

        debug_log!(
            "fetched {} rows from {} in {:.2}ms",
            data.len(),
            self.table,
            execution_time_ms
        );

        Ok(ExecutionResult {
            data,
            count,
            validation,
            execution_time_ms,
        })
    }

    fn cache_key(&self, descriptor: &QueryDescriptor) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match serde_json::to_value(descriptor) {
            Ok(query) => Some(cache.key_for(&self.table, &query)),
            Err(err) => {
                tracing::warn!(error = %err, "descriptor not serializable; skipping cache");
                None
            }
        }
    }

    async fn cached_page(&self, key: Option<&str>) -> Option<CachedPage> {
        let (cache, key) = (self.cache.as_ref()?, key?);

        match cache.get(key).await {
            Ok(Some(value)) => match serde_json::from_value::<CachedPage>(value) {
                Ok(page) => Some(page),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding malformed cache entry");
                    if let Err(err) = cache.evict(key).await {
                        tracing::warn!(error = %err, "cache evict failed");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "cache read failed");
                None
            }
        }
    }

    async fn store_page(&self, key: &str, data: &[Row], count: Option<u64>) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };

        let page: Value = json!({ "data": data, "count": count });
        if let Err(err) = cache.set(key, &page).await {
            tracing::warn!(error = %err, "cache write failed");
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{PostgrestAdapter, SqlAdapter};
    use crate::errors::DataSourceError;
    use async_trait::async_trait;
    use cache_system::MemoryCache;
    use query_model::builder::QueryBuilder;
    use query_model::condition::{Operator, TextSearchOptions};
    use query_model::descriptor::{Pagination, SortOrder};
    use query_model::group::Group;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubSource {
        adapter: PostgrestAdapter,
        rows: Vec<Row>,
        fail_fetch: bool,
        fail_count: bool,
        fetches: AtomicUsize,
    }

    impl StubSource {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                adapter: PostgrestAdapter::new(),
                rows,
                fail_fetch: false,
                fail_count: false,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DataSource for StubSource {
        fn adapter(&self) -> &dyn FilterAdapter {
            &self.adapter
        }

        async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<Row>, DataSourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(DataSourceError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.rows.clone())
        }

        async fn count(&self, _request: &CountRequest) -> Result<u64, DataSourceError> {
            if self.fail_count {
                return Err(DataSourceError::Decode("Missing Content-Range header".to_string()));
            }
            Ok(self.rows.len() as u64)
        }

        async fn health_check(&self) -> Result<(), DataSourceError> {
            Ok(())
        }
    }

    struct SqlStub;

    #[async_trait]
    impl DataSource for SqlStub {
        fn adapter(&self) -> &dyn FilterAdapter {
            &SqlAdapter
        }

        async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<Row>, DataSourceError> {
            Ok(Vec::new())
        }

        async fn count(&self, _request: &CountRequest) -> Result<u64, DataSourceError> {
            Ok(0)
        }

        async fn health_check(&self) -> Result<(), DataSourceError> {
            Ok(())
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            json!({"id": 1, "make": "BMW", "model": "3 Series"}),
            json!({"id": 2, "make": "BMW", "model": "3 Series Touring"}),
        ]
    }

    fn executor(source: StubSource) -> Executor {
        Executor::new(Arc::new(source), &QueryConfig::default())
    }

    #[test]
    fn test_translate_splits_and_or_and_groups() {
        let descriptor = QueryBuilder::new()
            .filter("make", Operator::Eq, "BMW")
            .or_filter("year", Operator::Gte, 2020)
            .or_filter("mileage", Operator::Lt, 10000)
            .filter_group(Logic::Or, |g| {
                g.filter("fuel_type", Operator::Eq, "diesel").group(Logic::And, |g| {
                    g.filter("fuel_type", Operator::Eq, "petrol")
                        .filter("engine_size", Operator::Lte, 2.0)
                })
            })
            .build()
            .unwrap();

        let translated = executor(StubSource::new(rows())).translate(&descriptor).unwrap();

        assert_eq!(
            translated.fetch.filters,
            vec![
                FilterOp::Condition(Condition::eq("make", "BMW")),
                FilterOp::Clause {
                    logic: Logic::Or,
                    clause: "or(year.gte.2020,mileage.lt.10000)".to_string(),
                },
                FilterOp::Clause {
                    logic: Logic::Or,
                    clause: "or(fuel_type.eq.diesel,and(fuel_type.eq.petrol,engine_size.lte.2.0))"
                        .to_string(),
                },
            ]
        );
        assert!(translated.fetch.order.is_empty());
        assert_eq!(translated.fetch.range, None);
        assert_eq!(translated.count, None);
    }

    #[test]
    fn test_translate_text_search_defaults_to_relevance_order() {
        let descriptor = QueryBuilder::new()
            .text_search("  BMW 3 Series ", TextSearchOptions::default())
            .paginate(2, 12)
            .build()
            .unwrap();

        let translated = executor(StubSource::new(rows())).translate(&descriptor).unwrap();

        assert_eq!(
            translated.fetch.filters,
            vec![FilterOp::TextSearch {
                column: "search_vector".to_string(),
                query: "BMW 3 Series".to_string(),
                search_type: Default::default(),
                config: Default::default(),
            }]
        );
        assert_eq!(
            translated.fetch.order,
            vec![SortSpec::desc("is_featured"), SortSpec::desc("view_count")]
        );
        assert_eq!(translated.fetch.range, Some((12, 23)));
        assert_eq!(
            translated.count,
            Some(CountRequest {
                table: "car_listings".to_string(),
                joins: Vec::new(),
                filters: translated.fetch.filters.clone(),
            })
        );
    }

    #[test]
    fn test_explicit_sort_overrides_relevance() {
        let descriptor = QueryBuilder::new()
            .text_search("estate", TextSearchOptions::default())
            .order_by("price", SortOrder::Asc)
            .build()
            .unwrap();

        let translated = executor(StubSource::new(rows())).translate(&descriptor).unwrap();
        assert_eq!(translated.fetch.order, vec![SortSpec::asc("price")]);
    }

    #[test]
    fn test_text_search_fields_become_or_of_patterns() {
        let descriptor = QueryBuilder::new()
            .text_search("golf", TextSearchOptions::default().fields(["make", "model"]))
            .build()
            .unwrap();

        let translated = executor(StubSource::new(rows())).translate(&descriptor).unwrap();

        assert_eq!(
            translated.fetch.filters,
            vec![FilterOp::Clause {
                logic: Logic::Or,
                clause: "or(make.ilike.%golf%,model.ilike.%golf%)".to_string(),
            }]
        );
    }

    #[test]
    fn test_translate_follows_source_grammar() {
        let descriptor = QueryDescriptor {
            groups: vec![Group::or(vec![
                Condition::eq("make", "BMW").into(),
                Condition::eq("make", "Audi").into(),
            ])],
            ..Default::default()
        };

        let executor = Executor::new(Arc::new(SqlStub), &QueryConfig::default());
        let translated = executor.translate(&descriptor).unwrap();

        assert_eq!(
            translated.fetch.filters,
            vec![FilterOp::Clause {
                logic: Logic::Or,
                clause: r#"("make" = 'BMW' OR "make" = 'Audi')"#.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_end_to_end_with_stub_source() {
        let descriptor: QueryDescriptor = serde_json::from_value(json!({
            "textSearch": {"query": "BMW 3 Series"},
            "conditions": [{"field": "make", "operator": "eq", "value": "BMW"}],
            "pagination": {"page": 1, "limit": 12}
        }))
        .unwrap();

        let result = executor(StubSource::new(rows()))
            .execute(&descriptor)
            .await
            .unwrap();

        assert_eq!(result.data.len(), 2);
        assert_eq!(result.count, Some(2));
        assert!(result.validation.is_valid);
        assert!(result.execution_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_failed_count_still_returns_rows() {
        let mut source = StubSource::new(rows());
        source.fail_count = true;

        let descriptor = QueryDescriptor {
            pagination: Some(Pagination::new(1, 12)),
            ..Default::default()
        };
        let result = executor(source).execute(&descriptor).await.unwrap();

        assert_eq!(result.data.len(), 2);
        assert_eq!(result.count, None);
    }

    #[tokio::test]
    async fn test_invalid_descriptor_never_reaches_source() {
        let source = Arc::new(StubSource::new(rows()));
        let executor = Executor::new(source.clone(), &QueryConfig::default());
        let descriptor = QueryDescriptor {
            pagination: Some(Pagination::new(0, 500)),
            ..Default::default()
        };

        let err = executor.execute(&descriptor).await.unwrap_err();

        assert_eq!(err.http_status(), 400);
        assert_eq!(err.validation_errors().map(|e| e.len()), Some(2));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_array_for_scalar_operator_is_bad_request() {
        let source = Arc::new(StubSource::new(rows()));
        let executor = Executor::new(source.clone(), &QueryConfig::default());
        let descriptor = QueryDescriptor {
            conditions: vec![Condition::eq("make", json!(["BMW", "Audi"]))],
            ..Default::default()
        };

        let err = executor.execute(&descriptor).await.unwrap_err();

        assert_eq!(err.http_status(), 400);
        assert_eq!(
            err.validation_errors(),
            Some(&["Condition 1: Operator 'eq' requires a scalar value".to_string()][..])
        );
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_execution_error() {
        let mut source = StubSource::new(rows());
        source.fail_fetch = true;

        let err = executor(source)
            .execute(&QueryDescriptor::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QueryError::Execution {
                source: DataSourceError::Status { status: 503, .. },
                ..
            }
        ));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn test_unpaginated_count_is_row_count() {
        let result = executor(StubSource::new(rows()))
            .execute(&QueryDescriptor::new())
            .await
            .unwrap();

        assert_eq!(result.count, Some(2));
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_queries() {
        let source = Arc::new(StubSource::new(rows()));
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60), 10, "test").unwrap());
        let executor =
            Executor::new(source.clone(), &QueryConfig::default()).with_cache(cache.clone());
        let descriptor = QueryBuilder::new()
            .filter("make", Operator::Eq, "BMW")
            .paginate(1, 12)
            .build()
            .unwrap();

        let first = executor.execute(&descriptor).await.unwrap();
        let second = executor.execute(&descriptor).await.unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.data, second.data);
        assert_eq!(second.count, Some(2));
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ExecutionResult {
            data: rows(),
            count: None,
            validation: ValidationResult {
                is_valid: true,
                ..Default::default()
            },
            execution_time_ms: 1.5,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["executionTimeMs"], json!(1.5));
        assert_eq!(value["count"], Value::Null);
        assert_eq!(value["validation"]["isValid"], json!(true));
    }
}
