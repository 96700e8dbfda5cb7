use crate::{
    domain::{Principal, Task, TaskId, TaskPatch},
    ports::{StoreError, StoreResult, TaskStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

/// Keeps the whole collection in one JSON file. Every write rewrites the file.
pub struct LocalTaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn default_path() -> StoreResult<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| StoreError::Io("Cannot determine data directory".to_string()))?;
        Ok(data_dir.join("taskdeck").join("tasks.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> StoreResult<Vec<Task>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            StoreError::Serialization(format!(
                "Failed to parse {}: {e}",
                self.path.display()
            ))
        })
    }

    async fn write_all(&self, tasks: &[Task]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(tasks)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write-then-rename so a crash never leaves a half-written file behind
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::debug!("Wrote {} tasks to {}", tasks.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl TaskStore for LocalTaskStore {
    fn requires_principal(&self) -> bool {
        false
    }

    async fn load_all(&self, _principal: Option<Principal>) -> StoreResult<Vec<Task>> {
        self.read_all().await
    }

    async fn insert(&self, task: &Task) -> StoreResult<Task> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.read_all().await?;
        tasks.retain(|t| t.id != task.id);
        tasks.insert(0, task.clone());
        self.write_all(&tasks).await?;
        Ok(task.clone())
    }

    async fn update_fields(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.read_all().await?;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Task {id}")))?;

        task.apply(patch);
        task.touch(updated_at);
        self.write_all(&tasks).await
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.read_all().await?;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(StoreError::NotFound(format!("Task {id}")));
        }
        self.write_all(&tasks).await
    }
}
