use crate::domain::{Principal, Task, TaskId, TaskPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimit(u64),

    #[error("API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence backend for the task collection. The remote and local backends both
/// implement this; only the coordinator talks to it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether mutations need a signed-in principal.
    fn requires_principal(&self) -> bool;

    async fn load_all(&self, principal: Option<Principal>) -> StoreResult<Vec<Task>>;
    async fn insert(&self, task: &Task) -> StoreResult<Task>;
    async fn update_fields(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn delete(&self, id: &TaskId) -> StoreResult<()>;
}
