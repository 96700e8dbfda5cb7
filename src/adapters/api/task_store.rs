use super::{RestClient, TaskPatchRow, TaskRow};
use crate::{
    domain::{Principal, Task, TaskId, TaskPatch},
    ports::{AuthProvider, StoreError, StoreResult, TaskStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const TABLE: &str = "todos";

/// Task store backed by the hosted table API. Every call runs as the signed-in user.
pub struct RemoteTaskStore {
    client: RestClient,
    auth: Arc<dyn AuthProvider>,
}

impl RemoteTaskStore {
    pub fn new(client: RestClient, auth: Arc<dyn AuthProvider>) -> Self {
        Self { client, auth }
    }

    async fn principal(&self) -> StoreResult<Principal> {
        self.auth
            .current_principal()
            .await
            .ok_or_else(|| StoreError::Authentication("No active session".to_string()))
    }

    fn build_query_string(params: &[(&str, String)]) -> String {
        if params.is_empty() {
            return String::new();
        }

        format!(
            "?{}",
            params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&")
        )
    }

    fn row_url(&self, id: &TaskId) -> String {
        let query = Self::build_query_string(&[("id", format!("eq.{}", id.0))]);
        self.client.table_url(TABLE, &query)
    }
}

#[async_trait]
impl TaskStore for RemoteTaskStore {
    fn requires_principal(&self) -> bool {
        true
    }

    async fn load_all(&self, principal: Option<Principal>) -> StoreResult<Vec<Task>> {
        let principal = match principal {
            Some(principal) => principal,
            None => self.principal().await?,
        };

        let query = Self::build_query_string(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", principal.user_id.0)),
            ("order", "created_at.desc".to_string()),
        ]);
        let url = self.client.table_url(TABLE, &query);

        let rows: Vec<TaskRow> = self.client.get(&url, &principal.access_token).await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn insert(&self, task: &Task) -> StoreResult<Task> {
        let principal = self.principal().await?;
        let url = self.client.table_url(TABLE, "");
        let row = TaskRow::from_task(task, &principal.user_id);

        let mut stored: Vec<TaskRow> = self
            .client
            .post(&url, &principal.access_token, &row)
            .await?;
        if stored.is_empty() {
            return Err(StoreError::Serialization(
                "Insert returned no rows".to_string(),
            ));
        }
        Ok(stored.swap_remove(0).into())
    }

    async fn update_fields(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let principal = self.principal().await?;
        let body = TaskPatchRow::new(patch, updated_at);
        self.client
            .patch(&self.row_url(id), &principal.access_token, &body)
            .await
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        let principal = self.principal().await?;
        self.client
            .delete(&self.row_url(id), &principal.access_token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_url_encoded() {
        let query = RemoteTaskStore::build_query_string(&[
            ("select", "*".to_string()),
            ("user_id", "eq.a b".to_string()),
        ]);
        assert_eq!(query, "?select=%2A&user_id=eq.a%20b");
        assert_eq!(RemoteTaskStore::build_query_string(&[]), "");
    }
}
