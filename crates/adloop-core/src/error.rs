// ABOUTME: Validation errors raised by the core domain types.
// ABOUTME: Covers score bounds, budget rules, and required input fields.

use thiserror::Error;

/// Errors produced when constructing or validating domain values.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("score {0} is out of range, expected 1..=10")]
    ScoreOutOfRange(i64),

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount { field: &'static str, value: f64 },

    #[error("total budget must be positive, got {0}")]
    InvalidBudget(f64),

    #[error("plans request {planned} in total, exceeding the budget of {total}")]
    OverBudget { planned: f64, total: f64 },
}
