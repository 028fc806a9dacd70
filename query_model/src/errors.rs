use crate::condition::Operator;
use thiserror::Error;

/// Misuse of the fluent builder, reported by `build()`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuilderError {
    #[error("{method}: field name cannot be empty")]
    EmptyField { method: &'static str },

    #[error("{method}: operator '{operator}' on '{field}' requires a value")]
    MissingValue {
        method: &'static str,
        field: String,
        operator: Operator,
    },

    #[error("{method}: operator '{operator}' on '{field}' requires an array value")]
    ExpectedArray {
        method: &'static str,
        field: String,
        operator: Operator,
    },
}
