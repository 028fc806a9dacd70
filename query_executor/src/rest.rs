//! PostgREST-compatible HTTP data source
//!
//! Talks to a managed backend exposing `/rest/v1/{table}`. Rows come back as a
//! JSON array; counts come from the `Content-Range` header of a `HEAD`
//! request sent with `Prefer: count=exact`.

use crate::adapter::{FilterAdapter, PostgrestAdapter};
use crate::errors::DataSourceError;
use crate::source::{CountRequest, DataSource, FetchRequest, FilterOp, Row};
use async_trait::async_trait;
use config::RestConfig;
use query_model::condition::TextSearchType;
use query_model::join::{JoinSpec, JoinType};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RestDataSource {
    client: reqwest::Client,
    base_url: String,
    schema: String,
    adapter: PostgrestAdapter,
}

impl RestDataSource {
    pub fn new(config: &RestConfig) -> Result<Self, DataSourceError> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.api_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key))?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            schema: config.schema.clone(),
            adapter: PostgrestAdapter::new(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("Accept-Profile", &self.schema)
    }

    /// Query parameters for a list of filter operations
    pub fn filter_params(&self, filters: &[FilterOp]) -> Result<Vec<(String, String)>, DataSourceError> {
        let mut params = Vec::with_capacity(filters.len());

        for filter in filters {
            match filter {
                FilterOp::Condition(condition) => {
                    let value = self
                        .adapter
                        .render_filter_value(condition)
                        .map_err(|err| DataSourceError::InvalidRequest(err.to_string()))?;
                    params.push((condition.field.clone(), value));
                }
                FilterOp::Clause { logic, clause } => {
                    let (key, value) = self.adapter.clause_param(*logic, clause).ok_or_else(|| {
                        DataSourceError::InvalidRequest(format!(
                            "Clause is not a {} expression: {}",
                            logic, clause
                        ))
                    })?;
                    params.push((key.to_string(), value.to_string()));
                }
                FilterOp::TextSearch {
                    column,
                    query,
                    search_type,
                    config,
                } => {
                    let operator = match search_type {
                        TextSearchType::Websearch => "wfts",
                        TextSearchType::Plainto => "plfts",
                        TextSearchType::Phraseto | TextSearchType::Phrase => "phfts",
                    };
                    params.push((
                        column.clone(),
                        format!("{}({}).{}", operator, config.as_str(), query),
                    ));
                }
            }
        }

        Ok(params)
    }

    /// `select` parameter: base columns plus one embed per join
    pub fn select_param(&self, joins: &[JoinSpec]) -> String {
        let mut select = vec!["*".to_string()];

        for join in joins {
            let mut embed = String::new();
            if let Some(alias) = &join.alias {
                embed.push_str(alias);
                embed.push(':');
            }
            embed.push_str(&join.table);
            if join.join_type == JoinType::Inner {
                embed.push_str("!inner");
            }
            let columns = if join.columns.is_empty() {
                "*".to_string()
            } else {
                join.columns.join(",")
            };
            embed.push_str(&format!("({})", columns));
            select.push(embed);
        }

        select.join(",")
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, DataSourceError> {
    HeaderValue::from_str(raw)
        .map_err(|err| DataSourceError::InvalidRequest(format!("Invalid header value: {}", err)))
}

async fn ensure_success(response: Response) -> Result<Response, DataSourceError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(DataSourceError::Status { status, body })
}

/// Total from a `Content-Range` value such as `0-11/57` or `*/0`
pub fn parse_content_range_total(raw: &str) -> Result<u64, DataSourceError> {
    let total = raw
        .rsplit_once('/')
        .map(|(_, total)| total.trim())
        .ok_or_else(|| DataSourceError::Decode(format!("Malformed Content-Range: {}", raw)))?;

    total
        .parse::<u64>()
        .map_err(|_| DataSourceError::Decode(format!("Content-Range has no exact total: {}", raw)))
}

#[async_trait]
impl DataSource for RestDataSource {
    fn adapter(&self) -> &dyn FilterAdapter {
        &self.adapter
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Row>, DataSourceError> {
        let mut params = vec![("select".to_string(), self.select_param(&request.joins))];
        params.extend(self.filter_params(&request.filters)?);

        if !request.order.is_empty() {
            let order = request
                .order
                .iter()
                .map(|sort| format!("{}.{}", sort.field, sort.order.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some((offset, limit)) = request.offset_limit() {
            params.push(("offset".to_string(), offset.to_string()));
            params.push(("limit".to_string(), limit.to_string()));
        }

        let response = self
            .request(Method::GET, &request.table)
            .query(&params)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        match response.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            other => Err(DataSourceError::Decode(format!(
                "Expected a JSON array of rows, got {}",
                other
            ))),
        }
    }

    async fn count(&self, request: &CountRequest) -> Result<u64, DataSourceError> {
        let mut params = vec![("select".to_string(), self.select_param(&request.joins))];
        params.extend(self.filter_params(&request.filters)?);

        let response = self
            .request(Method::HEAD, &request.table)
            .query(&params)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .ok_or_else(|| DataSourceError::Decode("Missing Content-Range header".to_string()))?
            .to_str()
            .map_err(|err| DataSourceError::Decode(err.to_string()))?;

        parse_content_range_total(content_range)
    }

    async fn health_check(&self) -> Result<(), DataSourceError> {
        let response = self
            .client
            .get(format!("{}/rest/v1/", self.base_url))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use query_model::condition::{Condition, Logic, TextSearchConfig};
    use query_model::descriptor::SortSpec;
    use serde_json::json;

    fn source(url: &str) -> RestDataSource {
        RestDataSource::new(&RestConfig::new(url.to_string(), "anon-key".to_string())).unwrap()
    }

    #[test]
    fn test_filter_params() {
        let source = source("http://localhost:54321");
        let params = source
            .filter_params(&[
                FilterOp::Condition(Condition::eq("make", "BMW")),
                FilterOp::Clause {
                    logic: Logic::Or,
                    clause: "or(year.gte.2020,mileage.lt.10000)".to_string(),
                },
                FilterOp::TextSearch {
                    column: "search_vector".to_string(),
                    query: "touring estate".to_string(),
                    search_type: TextSearchType::Websearch,
                    config: TextSearchConfig::English,
                },
            ])
            .unwrap();

        assert_eq!(
            params,
            vec![
                ("make".to_string(), "eq.BMW".to_string()),
                ("or".to_string(), "(year.gte.2020,mileage.lt.10000)".to_string()),
                (
                    "search_vector".to_string(),
                    "wfts(english).touring estate".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_mismatched_clause_is_rejected() {
        let source = source("http://localhost:54321");
        let result = source.filter_params(&[FilterOp::Clause {
            logic: Logic::And,
            clause: "or(a.eq.1)".to_string(),
        }]);

        assert!(matches!(result, Err(DataSourceError::InvalidRequest(_))));
    }

    #[test]
    fn test_select_param_embeds_joins() {
        let source = source("http://localhost:54321");
        let joins = vec![
            JoinSpec::inner("dealers")
                .with_alias("dealer")
                .with_columns(["name", "city"]),
            JoinSpec::left("photos"),
        ];

        assert_eq!(
            source.select_param(&joins),
            "*,dealer:dealers!inner(name,city),photos(*)"
        );
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range_total("0-11/57").unwrap(), 57);
        assert_eq!(parse_content_range_total("*/0").unwrap(), 0);
        assert!(parse_content_range_total("0-11/*").is_err());
        assert!(parse_content_range_total("garbage").is_err());
    }

    #[tokio::test]
    async fn test_fetch_sends_filters_order_and_range() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/rest/v1/car_listings")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer anon-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("make".into(), "eq.BMW".into()),
                Matcher::UrlEncoded("order".into(), "price.desc".into()),
                Matcher::UrlEncoded("offset".into(), "12".into()),
                Matcher::UrlEncoded("limit".into(), "12".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1,"make":"BMW"},{"id":2,"make":"BMW"}]"#)
            .expect(1)
            .create_async()
            .await;

        let mut request = FetchRequest::new("car_listings");
        request
            .filters
            .push(FilterOp::Condition(Condition::eq("make", "BMW")));
        request.order.push(SortSpec::desc("price"));
        request.range = Some((12, 23));

        let rows = source(&server.url()).fetch(&request).await.unwrap();

        assert_eq!(rows, vec![json!({"id":1,"make":"BMW"}), json!({"id":2,"make":"BMW"})]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_count_reads_content_range() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("HEAD", "/rest/v1/car_listings")
            .match_header("prefer", "count=exact")
            .match_query(Matcher::UrlEncoded("make".into(), "eq.Audi".into()))
            .with_status(200)
            .with_header("content-range", "0-24/341")
            .expect(1)
            .create_async()
            .await;

        let request = CountRequest {
            table: "car_listings".to_string(),
            joins: Vec::new(),
            filters: vec![FilterOp::Condition(Condition::eq("make", "Audi"))],
        };

        assert_eq!(source(&server.url()).count(&request).await.unwrap(), 341);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_count_embeds_inner_joins() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("HEAD", "/rest/v1/car_listings")
            .match_header("prefer", "count=exact")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*,dealer:dealers!inner(city)".into()),
                Matcher::UrlEncoded("dealer.city".into(), "eq.Leeds".into()),
            ]))
            .with_status(200)
            .with_header("content-range", "*/17")
            .expect(1)
            .create_async()
            .await;

        let request = CountRequest {
            table: "car_listings".to_string(),
            joins: vec![JoinSpec::inner("dealers").with_alias("dealer").with_columns(["city"])],
            filters: vec![FilterOp::Condition(Condition::eq("dealer.city", "Leeds"))],
        };

        assert_eq!(source(&server.url()).count(&request).await.unwrap(), 17);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dotted_values_are_sent_verbatim() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/rest/v1/car_listings")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("model".into(), "eq.3.0 TDI".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":7,"model":"3.0 TDI"}]"#)
            .expect(1)
            .create_async()
            .await;

        let mut request = FetchRequest::new("car_listings");
        request
            .filters
            .push(FilterOp::Condition(Condition::eq("model", "3.0 TDI")));

        let rows = source(&server.url()).fetch(&request).await.unwrap();

        assert_eq!(rows, vec![json!({"id":7,"model":"3.0 TDI"})]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/rest/v1/car_listings")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message":"column car_listings.colour does not exist"}"#)
            .create_async()
            .await;

        let err = source(&server.url())
            .fetch(&FetchRequest::new("car_listings"))
            .await
            .unwrap_err();

        match err {
            DataSourceError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("colour"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/rest/v1/")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        assert!(source(&server.url()).health_check().await.is_ok());
    }
}
