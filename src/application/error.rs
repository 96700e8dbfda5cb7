use crate::domain::{DomainError, TaskId};
use crate::ports::{ConfigError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(#[from] DomainError),

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Authentication required")]
    AuthenticationRequired,

    /// The local change was applied but the store rejected it. Local and stored
    /// state now differ until the next successful write or reload.
    #[error("Failed to save change: {0}")]
    Persistence(StoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

pub type AppResult<T> = Result<T, AppError>;
