use thiserror::Error;

use crate::iban::InvalidIbanError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Iban(#[from] InvalidIbanError),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("Invalid month {0}, expected 1-12")]
    InvalidMonth(u32),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Trims `value` and rejects it when nothing is left.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(trimmed.to_string())
}
