use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Task text cannot be empty")]
    EmptyText,

    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

pub type DomainResult<T> = Result<T, DomainError>;
