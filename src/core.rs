//! Core QueryKit functionality
//!
//! [`SearchService`] ties the workspace together: it owns an executor bound to
//! a data source (and optional cache) and exposes building, checking and
//! running search descriptors.

use std::sync::Arc;

use cache_system::{SearchCache, build_cache};
use config::{AppConfig, QueryConfig};
use query_executor::{DataSource, ExecutionResult, Executor, PgDataSource, RestDataSource};
use query_model::{
    CommonQueryPatterns, ComplexityScore, QueryBuilder, QueryDescriptor, QueryOptimizer,
    SearchParams, ValidationResult,
};

use crate::errors::QueryKitError;

/// Search entry point for one listings table
pub struct SearchService {
    executor: Executor,
    optimizer: QueryOptimizer,
    patterns: CommonQueryPatterns,
}

impl SearchService {
    /// Build from application config.
    ///
    /// A configured REST endpoint takes precedence over a direct database
    /// connection.
    pub async fn from_config(config: &AppConfig) -> Result<Self, QueryKitError> {
        let source: Arc<dyn DataSource> = if let Some(rest) = &config.rest {
            Arc::new(RestDataSource::new(rest)?)
        } else if let Some(database) = &config.database {
            Arc::new(PgDataSource::connect(database).await?)
        } else {
            return Err(QueryKitError::NoDataSource);
        };

        let service = Self::with_source(source, &config.query);
        match build_cache(&config.cache)? {
            Some(cache) => Ok(service.with_cache(cache)),
            None => Ok(service),
        }
    }

    pub fn with_source(source: Arc<dyn DataSource>, config: &QueryConfig) -> Self {
        Self {
            executor: Executor::new(source, config),
            optimizer: QueryOptimizer::from(config),
            patterns: CommonQueryPatterns::from(config),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SearchCache>) -> Self {
        self.executor = self.executor.with_cache(cache);
        self
    }

    pub fn builder(&self) -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Prebuilt descriptors for common listing searches
    pub fn patterns(&self) -> &CommonQueryPatterns {
        &self.patterns
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn validate(&self, descriptor: &QueryDescriptor) -> ValidationResult {
        self.executor.validator().validate(descriptor)
    }

    pub fn analyze(&self, descriptor: &QueryDescriptor) -> ComplexityScore {
        self.optimizer.analyze_complexity(descriptor)
    }

    pub fn suggest_indexes(&self, descriptor: &QueryDescriptor) -> Vec<String> {
        self.optimizer.suggest_indexes(descriptor)
    }

    /// Optimize and run a descriptor
    pub async fn search(&self, descriptor: &QueryDescriptor) -> Result<ExecutionResult, QueryKitError> {
        let optimized = self.optimizer.optimize(descriptor);

        let complexity = self.optimizer.analyze_complexity(&optimized);
        if !complexity.warnings.is_empty() {
            tracing::warn!(
                score = complexity.score,
                warnings = ?complexity.warnings,
                "expensive search query"
            );
        }
        debug_log!("running search with complexity score {}", complexity.score);

        Ok(self.executor.execute(&optimized).await?)
    }

    /// Run a search described by flat request parameters
    pub async fn search_params(&self, params: &SearchParams) -> Result<ExecutionResult, QueryKitError> {
        let descriptor = self.patterns.from_params(params)?;
        self.search(&descriptor).await
    }

    /// Check the data source is reachable
    pub async fn health_check(&self) -> Result<(), QueryKitError> {
        self.executor.source().health_check().await?;
        Ok(())
    }
}
