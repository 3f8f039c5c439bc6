use sea_orm::DbErr;
use thiserror::Error;

/// Failures of the entity helpers in this crate.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Db(#[from] DbErr),
}
