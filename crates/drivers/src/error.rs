use thiserror::Error;

pub type DriverResult<T> = Result<T, DriverError>;

/// Failures surfaced by a backend driver. Display is the driver's own text,
/// passed through to callers unchanged.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Sql(#[from] sqlx::Error),

    #[error("{0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Failure reported as plain text, for backends without a typed error.
    #[error("{0}")]
    Other(String),
}
