//! Error types for query execution
//!
//! [`QueryError`] is what callers of the executor see. Route layers map it to
//! a response with [`QueryError::http_status`] and [`QueryError::public_message`].

use query_model::condition::Operator;
use thiserror::Error;

/// A descriptor that cannot be expressed in a backend grammar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Operator '{operator}' on '{field}': {reason}")]
    UnsupportedValue {
        field: String,
        operator: Operator,
        reason: String,
    },

    #[error("{0}: Group must contain at least one condition")]
    EmptyGroup(String),

    #[error("{location}: {source}")]
    At {
        location: String,
        source: Box<TranslationError>,
    },
}

impl TranslationError {
    /// Attach the position of the offending condition
    pub fn at(self, location: impl Into<String>) -> Self {
        TranslationError::At {
            location: location.into(),
            source: Box::new(self),
        }
    }
}

/// Failure reported by a data source
#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Query validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Query translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Query execution failed on '{table}': {source}")]
    Execution {
        table: String,
        #[source]
        source: DataSourceError,
    },
}

impl QueryError {
    pub fn execution(table: &str, source: DataSourceError) -> Self {
        QueryError::Execution {
            table: table.to_string(),
            source,
        }
    }

    /// 400 for problems with the request, 500 for everything else
    pub fn http_status(&self) -> u16 {
        match self {
            QueryError::Validation { .. } => 400,
            QueryError::Translation(_) | QueryError::Execution { .. } => 500,
        }
    }

    /// Message safe to return to clients; backend details stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            QueryError::Validation { errors } => {
                format!("Invalid search query: {}", errors.join("; "))
            }
            QueryError::Translation(_) => "Search query could not be processed".to_string(),
            QueryError::Execution { .. } => "Search failed, please try again later".to_string(),
        }
    }

    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            QueryError::Validation { errors } => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        let validation = QueryError::Validation {
            errors: vec!["Limit must be between 1 and 100".to_string()],
        };
        let execution = QueryError::execution(
            "car_listings",
            DataSourceError::Status {
                status: 503,
                body: "upstream down".to_string(),
            },
        );

        assert_eq!(validation.http_status(), 400);
        assert_eq!(execution.http_status(), 500);
        assert_eq!(
            validation.public_message(),
            "Invalid search query: Limit must be between 1 and 100"
        );
        assert!(!execution.public_message().contains("upstream"));
        assert!(execution.to_string().contains("car_listings"));
    }

    #[test]
    fn test_located_translation_error() {
        let err = TranslationError::EmptyGroup("Group 1".to_string());
        assert_eq!(
            err.to_string(),
            "Group 1: Group must contain at least one condition"
        );

        let located = TranslationError::InvalidField {
            field: "a b".to_string(),
            reason: "bad".to_string(),
        }
        .at("Group 2, Condition 1");
        assert_eq!(located.to_string(), "Group 2, Condition 1: Invalid field 'a b': bad");
    }
}
