use crate::domain::*;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// Row shape of the `todos` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub due_date: Option<String>, // YYYY-MM-DD format
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub deleted: Option<bool>,
    pub created_at: String, // ISO 8601 format
    #[serde(default)]
    pub updated_at: Option<String>,
}

// Request DTOs
#[derive(Debug, Default, Serialize)]
pub struct TaskPatchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct SignInDto {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponseDto {
    pub access_token: String,
    pub user: AuthUserDto,
}

#[derive(Debug, Deserialize)]
pub struct AuthUserDto {
    pub id: String,
    pub email: Option<String>,
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_timestamp(column: &str, value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("Ignoring unparseable {} {:?}: {}", column, value, e);
            None
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!("Ignoring unparseable due_date {:?}: {}", value, e);
            None
        }
    }
}

impl TaskRow {
    pub fn from_task(task: &Task, user_id: &UserId) -> Self {
        Self {
            id: task.id.0.clone(),
            user_id: Some(user_id.0.clone()),
            text: task.text.clone(),
            details: Some(task.details.clone()),
            completed: Some(task.completed),
            due_date: task.due_date.map(format_date),
            tag: Some(task.tag.clone()),
            is_favorite: Some(task.is_favorite),
            deleted: Some(task.deleted),
            created_at: format_timestamp(task.created_at),
            updated_at: Some(format_timestamp(task.updated_at)),
        }
    }
}

// Conversion implementations
impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        let created_at = parse_timestamp("created_at", &row.created_at).unwrap_or_else(Utc::now);
        // Rows written before updated_at existed fall back to created_at
        let updated_at = row
            .updated_at
            .as_deref()
            .and_then(|at| parse_timestamp("updated_at", at))
            .map_or(created_at, |at| at.max(created_at));

        Self {
            id: TaskId(row.id),
            text: row.text,
            details: row.details.unwrap_or_default(),
            completed: row.completed.unwrap_or(false),
            due_date: row.due_date.as_deref().and_then(parse_date),
            tag: row.tag.unwrap_or_default(),
            is_favorite: row.is_favorite.unwrap_or(false),
            deleted: row.deleted.unwrap_or(false),
            created_at,
            updated_at,
        }
    }
}

impl TaskPatchRow {
    pub fn new(patch: &TaskPatch, updated_at: DateTime<Utc>) -> Self {
        Self {
            text: patch.text.clone(),
            details: patch.details.clone(),
            due_date: patch.due_date.map(|date| date.map(format_date)),
            tag: patch.tag.clone(),
            completed: patch.completed,
            is_favorite: patch.is_favorite,
            deleted: patch.deleted,
            updated_at: format_timestamp(updated_at),
        }
    }
}

impl From<TokenResponseDto> for Principal {
    fn from(dto: TokenResponseDto) -> Self {
        Self {
            user_id: UserId(dto.user.id),
            email: dto.user.email,
            access_token: dto.access_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_maps_snake_case_columns() {
        let row: TaskRow = serde_json::from_value(json!({
            "id": "abc",
            "user_id": "u1",
            "text": "Buy milk",
            "details": null,
            "completed": true,
            "due_date": "2024-01-01",
            "tag": "shop",
            "is_favorite": null,
            "deleted": false,
            "created_at": "2024-01-01T10:00:00+00:00",
            "updated_at": "2024-01-02T10:00:00.000Z"
        }))
        .unwrap();

        let task: Task = row.into();
        assert_eq!(task.id, TaskId::from("abc"));
        assert_eq!(task.details, "");
        assert!(task.completed);
        assert!(!task.is_favorite);
        assert_eq!(task.due_date, Some(parse_due_date("2024-01-01").unwrap()));
        assert_eq!(task.tag_label(), Some("shop"));
        assert!(task.updated_at > task.created_at);
    }

    #[test]
    fn missing_updated_at_falls_back_to_created_at() {
        let row: TaskRow = serde_json::from_value(json!({
            "id": "abc",
            "text": "Old row",
            "created_at": "2023-05-01T00:00:00Z"
        }))
        .unwrap();

        let task: Task = row.into();
        assert_eq!(task.updated_at, task.created_at);
        assert_eq!(task.tag, "");
    }

    #[test]
    fn null_flags_read_as_false() {
        let row: TaskRow = serde_json::from_value(json!({
            "id": "abc",
            "text": "Half-migrated row",
            "completed": null,
            "deleted": null,
            "is_favorite": null,
            "created_at": "2024-03-01T08:00:00Z",
            "updated_at": null
        }))
        .unwrap();

        let task: Task = row.into();
        assert!(!task.completed);
        assert!(!task.deleted);
        assert!(!task.is_favorite);
        assert_eq!(task.updated_at, task.created_at);
    }

    #[test]
    fn unparseable_timestamps_and_dates_still_load() {
        let before = Utc::now();
        let row: TaskRow = serde_json::from_value(json!({
            "id": "abc",
            "text": "Broken clock",
            "due_date": "someday",
            "created_at": "yesterday",
            "updated_at": "2020-01-01T00:00:00Z"
        }))
        .unwrap();

        let task: Task = row.into();
        assert!(task.created_at >= before);
        assert_eq!(task.updated_at, task.created_at);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn patch_row_keeps_explicit_clears() {
        let patch = TaskPatch {
            due_date: Some(None),
            tag: Some(String::new()),
            ..Default::default()
        };
        let value = serde_json::to_value(TaskPatchRow::new(&patch, Utc::now())).unwrap();

        assert_eq!(value["due_date"], serde_json::Value::Null);
        assert_eq!(value["tag"], "");
        assert!(value.get("text").is_none());
        assert!(value.get("completed").is_none());
        assert!(value.get("updated_at").is_some());
    }

    #[test]
    fn insert_row_carries_owner() {
        let task = Task::new(TaskId::from("t1"), TaskDraft::new("Walk dog"), Utc::now());
        let row = TaskRow::from_task(&task, &UserId::from("u1"));
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["is_favorite"], false);
        assert_eq!(value["due_date"], serde_json::Value::Null);
    }
}
