//! Named query patterns
//!
//! Ready-made descriptors for the common marketplace searches, and a mapping
//! from flat request parameters to a descriptor.

use crate::builder::QueryBuilder;
use crate::condition::{Operator, TextSearchOptions};
use crate::descriptor::{QueryDescriptor, SortOrder};
use crate::errors::BuilderError;
use chrono::{DateTime, Utc};
use config::QueryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_PAGE_LIMIT: u32 = 12;
const CREATED_AT: &str = "created_at";

/// Flat search parameters as they arrive from a query string or form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchParams {
    pub query: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub fuel_types: Vec<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CommonQueryPatterns {
    boost_field: String,
    popularity_field: String,
    page_limit: u32,
}

impl Default for CommonQueryPatterns {
    fn default() -> Self {
        Self {
            boost_field: "is_featured".to_string(),
            popularity_field: "view_count".to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl From<&QueryConfig> for CommonQueryPatterns {
    fn from(config: &QueryConfig) -> Self {
        Self {
            boost_field: config.boost_field.clone(),
            popularity_field: config.popularity_field.clone(),
            page_limit: DEFAULT_PAGE_LIMIT.min(config.max_page_limit),
        }
    }
}

impl CommonQueryPatterns {
    /// Free-text search over the search vector, first page
    pub fn text_search(&self, query: &str) -> Result<QueryDescriptor, BuilderError> {
        QueryBuilder::new()
            .text_search(query, TextSearchOptions::default())
            .paginate(1, self.page_limit)
            .build()
    }

    pub fn make_model(
        &self,
        make: &str,
        model: Option<&str>,
    ) -> Result<QueryDescriptor, BuilderError> {
        let mut builder = QueryBuilder::new().filter("make", Operator::Eq, make);
        if let Some(model) = model {
            builder = builder.filter("model", Operator::Eq, model);
        }
        builder
            .order_by(CREATED_AT, SortOrder::Desc)
            .paginate(1, self.page_limit)
            .build()
    }

    /// Listings priced within `[min, max]`, cheapest first
    pub fn price_range(&self, min: f64, max: f64) -> Result<QueryDescriptor, BuilderError> {
        QueryBuilder::new()
            .filter_between("price", min, max)
            .order_by("price", SortOrder::Asc)
            .paginate(1, self.page_limit)
            .build()
    }

    pub fn year_range(&self, min: i32, max: i32) -> Result<QueryDescriptor, BuilderError> {
        QueryBuilder::new()
            .filter_between("year", min, max)
            .order_by("year", SortOrder::Desc)
            .paginate(1, self.page_limit)
            .build()
    }

    /// Listings created at or after `since`, newest first
    pub fn recent_listings(&self, since: DateTime<Utc>) -> Result<QueryDescriptor, BuilderError> {
        QueryBuilder::new()
            .filter(CREATED_AT, Operator::Gte, since.to_rfc3339())
            .order_by(CREATED_AT, SortOrder::Desc)
            .paginate(1, self.page_limit)
            .build()
    }

    /// Boosted listings, most viewed first
    pub fn featured(&self) -> Result<QueryDescriptor, BuilderError> {
        QueryBuilder::new()
            .filter(&self.boost_field, Operator::Eq, true)
            .order_by(&self.popularity_field, SortOrder::Desc)
            .paginate(1, self.page_limit)
            .build()
    }

    /// Map flat parameters to a descriptor. Absent parameters add nothing;
    /// blank strings count as absent.
    pub fn from_params(&self, params: &SearchParams) -> Result<QueryDescriptor, BuilderError> {
        let mut builder = QueryBuilder::new();

        if let Some(query) = non_blank(&params.query) {
            builder = builder.text_search(query, TextSearchOptions::default());
        }
        if let Some(make) = non_blank(&params.make) {
            builder = builder.filter("make", Operator::Eq, make);
        }
        if let Some(model) = non_blank(&params.model) {
            builder = builder.filter("model", Operator::Eq, model);
        }
        if let Some(min) = params.min_price {
            builder = builder.filter("price", Operator::Gte, min);
        }
        if let Some(max) = params.max_price {
            builder = builder.filter("price", Operator::Lte, max);
        }
        if let Some(min) = params.min_year {
            builder = builder.filter("year", Operator::Gte, min);
        }
        if let Some(max) = params.max_year {
            builder = builder.filter("year", Operator::Lte, max);
        }
        match params.fuel_types.as_slice() {
            [] => {}
            [single] => builder = builder.filter("fuel_type", Operator::Eq, single.as_str()),
            many => {
                builder = builder.filter_in(
                    "fuel_type",
                    many.iter().map(|fuel| Value::from(fuel.as_str())),
                )
            }
        }
        if let Some(sort) = non_blank(&params.sort) {
            builder = builder.order_by(sort, params.order.unwrap_or_default());
        }

        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(self.page_limit);
        builder.paginate(page, limit).build()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
