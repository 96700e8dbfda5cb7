use super::{AppError, AppResult};
use crate::domain::*;
use crate::ports::{AuthProvider, SessionEvent, StoreError, StoreResult, TaskStore};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Caller-side answer to "delete this task forever?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Owns the in-memory task collection and applies every mutation optimistically:
/// the local change lands first, then the store is asked to persist it. A failed
/// store call is reported but the local change is kept.
pub struct TaskCoordinator {
    store: Arc<dyn TaskStore>,
    auth: Option<Arc<dyn AuthProvider>>,
    persist_timeout: Duration,
    tasks: RwLock<Vec<Task>>,
}

impl TaskCoordinator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        auth: Option<Arc<dyn AuthProvider>>,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            store,
            auth,
            persist_timeout,
            tasks: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the current collection.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn find(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().await.iter().find(|t| &t.id == id).cloned()
    }

    pub async fn view(&self, params: &ViewParams) -> View {
        let tasks = self.tasks.read().await;
        compute_view(&tasks, params)
    }

    /// Replace the collection with whatever the store holds for the current principal.
    pub async fn load(&self) -> AppResult<usize> {
        let principal = self.current_principal().await;
        self.load_for(principal).await
    }

    pub async fn handle_session_event(&self, event: SessionEvent) -> AppResult<usize> {
        match event {
            SessionEvent::SignedIn(principal) => {
                tracing::info!("Session started for {}, reloading tasks", principal.user_id);
                self.load_for(Some(principal)).await
            }
            SessionEvent::SignedOut => {
                tracing::info!("Session ended, clearing tasks");
                self.tasks.write().await.clear();
                Ok(0)
            }
        }
    }

    /// Handle the latest session value on `sessions`, marking it seen.
    pub async fn sync_session(
        &self,
        sessions: &mut watch::Receiver<Option<Principal>>,
    ) -> AppResult<usize> {
        let event = SessionEvent::from(sessions.borrow_and_update().clone());
        self.handle_session_event(event).await
    }

    /// React to every session change the auth provider publishes, until it goes away.
    pub async fn follow_session(&self) {
        let Some(auth) = &self.auth else {
            return;
        };
        let mut sessions = auth.subscribe();
        while sessions.changed().await.is_ok() {
            if let Err(e) = self.sync_session(&mut sessions).await {
                tracing::warn!("Session change left tasks unloaded: {}", e);
            }
        }
        tracing::debug!("Session publisher closed");
    }

    pub async fn create(&self, draft: TaskDraft) -> AppResult<Task> {
        let draft = draft.validate()?;
        self.ensure_authorized().await?;

        let task = Task::new(TaskId::generate(), draft, Utc::now());
        self.tasks.write().await.insert(0, task.clone());
        tracing::debug!("Created task {} locally", task.id);

        let store = Arc::clone(&self.store);
        let pending = task.clone();
        let stored = self
            .persist("create", &task.id, async move { store.insert(&pending).await })
            .await?;
        tracing::debug!("Store accepted task {}", stored.id);

        Ok(task)
    }

    pub async fn toggle_complete(&self, id: &TaskId) -> AppResult<Task> {
        self.ensure_authorized().await?;
        let task = self.mutate(id, |t| t.completed = !t.completed).await?;
        self.persist_patch("toggle_complete", &task, TaskPatch::completed(task.completed))
            .await?;
        Ok(task)
    }

    pub async fn toggle_favorite(&self, id: &TaskId) -> AppResult<Task> {
        self.ensure_authorized().await?;
        let task = self.mutate(id, |t| t.is_favorite = !t.is_favorite).await?;
        self.persist_patch("toggle_favorite", &task, TaskPatch::favorite(task.is_favorite))
            .await?;
        Ok(task)
    }

    pub async fn soft_delete(&self, id: &TaskId) -> AppResult<Task> {
        self.set_deleted("soft_delete", id, true).await
    }

    pub async fn restore(&self, id: &TaskId) -> AppResult<Task> {
        self.set_deleted("restore", id, false).await
    }

    /// Remove a task for good. Returns `None` when the caller declined.
    pub async fn permanent_delete(
        &self,
        id: &TaskId,
        confirmation: Confirmation,
    ) -> AppResult<Option<Task>> {
        if confirmation == Confirmation::Declined {
            tracing::debug!("Permanent delete of {} declined", id);
            return Ok(None);
        }
        self.ensure_authorized().await?;

        let removed = {
            let mut tasks = self.tasks.write().await;
            let Some(index) = tasks.iter().position(|t| &t.id == id) else {
                tracing::warn!("Permanent delete of unknown task {}", id);
                return Err(AppError::NotFound(id.clone()));
            };
            tasks.remove(index)
        };

        let store = Arc::clone(&self.store);
        let task_id = id.clone();
        self.persist("permanent_delete", id, async move { store.delete(&task_id).await })
            .await?;

        Ok(Some(removed))
    }

    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> AppResult<Task> {
        let patch = patch.validate()?;
        self.ensure_authorized().await?;

        let task = self.mutate(id, |t| t.apply(&patch)).await?;
        self.persist_patch("update", &task, patch).await?;
        Ok(task)
    }

    async fn set_deleted(
        &self,
        operation: &'static str,
        id: &TaskId,
        deleted: bool,
    ) -> AppResult<Task> {
        self.ensure_authorized().await?;
        let task = self.mutate(id, |t| t.deleted = deleted).await?;
        self.persist_patch(operation, &task, TaskPatch::deleted(deleted)).await?;
        Ok(task)
    }

    async fn current_principal(&self) -> Option<Principal> {
        match &self.auth {
            Some(auth) => auth.current_principal().await,
            None => None,
        }
    }

    async fn ensure_authorized(&self) -> AppResult<()> {
        if self.store.requires_principal() && self.current_principal().await.is_none() {
            return Err(AppError::AuthenticationRequired);
        }
        Ok(())
    }

    async fn load_for(&self, principal: Option<Principal>) -> AppResult<usize> {
        if self.store.requires_principal() && principal.is_none() {
            self.tasks.write().await.clear();
            return Err(AppError::AuthenticationRequired);
        }

        let loaded = tokio::time::timeout(self.persist_timeout, self.store.load_all(principal))
            .await
            .map_err(|_| StoreError::Timeout(self.persist_timeout))??;

        let count = loaded.len();
        *self.tasks.write().await = loaded;
        tracing::info!("Loaded {} tasks", count);
        Ok(count)
    }

    /// Apply `change` to the task in place and bump its `updated_at`. The write lock is
    /// released before returning so the store call never holds it.
    async fn mutate(&self, id: &TaskId, change: impl FnOnce(&mut Task)) -> AppResult<Task> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.iter_mut().find(|t| &t.id == id) else {
            tracing::warn!("Ignoring mutation of unknown task {}", id);
            return Err(AppError::NotFound(id.clone()));
        };

        change(task);
        task.touch(Utc::now());
        Ok(task.clone())
    }

    async fn persist_patch(
        &self,
        operation: &'static str,
        task: &Task,
        patch: TaskPatch,
    ) -> AppResult<()> {
        let store = Arc::clone(&self.store);
        let task_id = task.id.clone();
        let updated_at = task.updated_at;
        self.persist(operation, &task.id, async move {
            store.update_fields(&task_id, &patch, updated_at).await
        })
        .await
    }

    /// Run one store call on its own task under the persist timeout. Store errors,
    /// timeouts and panics all come back as values; the local collection is untouched.
    async fn persist<T, Fut>(
        &self,
        operation: &'static str,
        id: &TaskId,
        call: Fut,
    ) -> AppResult<T>
    where
        T: Send + 'static,
        Fut: Future<Output = StoreResult<T>> + Send + 'static,
    {
        let timeout = self.persist_timeout;
        let handle = tokio::spawn(async move { tokio::time::timeout(timeout, call).await });

        match handle.await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => {
                tracing::error!("{} of {} failed, keeping local change: {}", operation, id, e);
                Err(AppError::Persistence(e))
            }
            Ok(Err(_)) => {
                tracing::error!("{} of {} timed out after {:?}", operation, id, timeout);
                Err(AppError::Persistence(StoreError::Timeout(timeout)))
            }
            Err(e) => {
                tracing::error!("{} of {} aborted unexpectedly: {}", operation, id, e);
                Err(AppError::Unexpected(format!("{operation} failed: {e}")))
            }
        }
    }
}
