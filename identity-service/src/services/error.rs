use service_core::error::AppError;
use thiserror::Error;

/// Failure reported by a [`ContactStore`](super::ContactStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write, or the rows the write
    /// depended on changed since they were read.
    #[error("Conflicting contact write: {0}")]
    Conflict(String),

    #[error("Contact store unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            other => StoreError::Unavailable(anyhow::Error::new(other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Either email or phoneNumber must be provided")]
    Validation,

    #[error("Contact update conflicted with a concurrent request: {0}")]
    Conflict(String),

    #[error("Contact store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reason) => IdentityError::Conflict(reason),
            StoreError::Unavailable(e) => IdentityError::StoreUnavailable(e),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Validation => AppError::BadRequest(anyhow::anyhow!(
                "Either email or phoneNumber must be provided"
            )),
            IdentityError::Conflict(reason) => AppError::Conflict(anyhow::anyhow!(reason)),
            IdentityError::StoreUnavailable(e) => AppError::DatabaseError(e),
        }
    }
}
