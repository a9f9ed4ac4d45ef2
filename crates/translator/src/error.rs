use thiserror::Error;

pub type TranslateResult<T> = Result<T, TranslateError>;

/// Rejections raised while building a backend query. All of them are caller
/// mistakes and surface as validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("{0} name is required")]
    EmptyIdentifier(&'static str),

    #[error("invalid identifier {0:?}: NUL bytes are not allowed")]
    InvalidIdentifier(String),

    #[error("WHERE clause is required for safety")]
    MissingCondition,

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}
