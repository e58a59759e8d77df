use kasboek_core::{ConsistencyError, ValidationError};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error("Malformed stored value: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps a unique-constraint failure to `Conflict(message)`, anything else to `Db`.
    pub(crate) fn on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(message())
            }
            other => StoreError::Db(other),
        }
    }
}
