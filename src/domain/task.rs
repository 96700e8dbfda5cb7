use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        TaskId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Empty string means "no tag".
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a fresh task from an already validated draft.
    pub fn new(id: TaskId, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text: draft.text,
            details: draft.details,
            completed: false,
            due_date: draft.due_date,
            tag: draft.tag,
            is_favorite: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tag_label(&self) -> Option<&str> {
        if self.tag.is_empty() {
            None
        } else {
            Some(self.tag.as_str())
        }
    }

    /// Bump `updated_at`, never letting it fall behind `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    /// Apply every field present in `patch`. Absent fields are left alone.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(details) = &patch.details {
            self.details = details.clone();
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(tag) = &patch.tag {
            self.tag = tag.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(is_favorite) = patch.is_favorite {
            self.is_favorite = is_favorite;
        }
        if let Some(deleted) = patch.deleted {
            self.deleted = deleted;
        }
    }
}

/// Form data for a new task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub text: String,
    pub details: String,
    pub due_date: Option<NaiveDate>,
    pub tag: String,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Trim the free-text fields and reject a blank title.
    pub fn validate(self) -> DomainResult<Self> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyText);
        }

        Ok(Self {
            text: text.to_string(),
            details: self.details.trim().to_string(),
            due_date: self.due_date,
            tag: self.tag.trim().to_string(),
        })
    }
}

/// Partial edit. A `Some` field is applied even when it holds an empty string or
/// `false`; `due_date: Some(None)` clears the date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub details: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub tag: Option<String>,
    pub completed: Option<bool>,
    pub is_favorite: Option<bool>,
    pub deleted: Option<bool>,
}

impl TaskPatch {
    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            ..Default::default()
        }
    }

    pub fn favorite(value: bool) -> Self {
        Self {
            is_favorite: Some(value),
            ..Default::default()
        }
    }

    pub fn deleted(value: bool) -> Self {
        Self {
            deleted: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Same trimming rules as [`TaskDraft::validate`], applied to present fields only.
    pub fn validate(self) -> DomainResult<Self> {
        let text = match self.text {
            Some(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::EmptyText);
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        Ok(Self {
            text,
            details: self.details.map(|d| d.trim().to_string()),
            tag: self.tag.map(|t| t.trim().to_string()),
            ..self
        })
    }
}

/// Parse a date-only `YYYY-MM-DD` value.
pub fn parse_due_date(value: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).single().unwrap()
    }

    #[test]
    fn draft_validation_trims_and_rejects_blank_text() {
        assert_eq!(TaskDraft::new("   ").validate(), Err(DomainError::EmptyText));

        let draft = TaskDraft {
            text: "  Buy milk ".to_string(),
            details: " 2 litres ".to_string(),
            due_date: None,
            tag: " shopping ".to_string(),
        }
        .validate()
        .unwrap();

        assert_eq!(draft.text, "Buy milk");
        assert_eq!(draft.details, "2 litres");
        assert_eq!(draft.tag, "shopping");
    }

    #[test]
    fn new_task_has_defaults() {
        let task = Task::new(TaskId::from("t1"), TaskDraft::new("Buy milk"), at(1_000));
        assert!(!task.completed);
        assert!(!task.deleted);
        assert!(!task.is_favorite);
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.tag_label(), None);
    }

    #[test]
    fn touch_never_goes_before_created_at() {
        let mut task = Task::new(TaskId::from("t1"), TaskDraft::new("x"), at(5_000));
        task.touch(at(5_000) - Duration::seconds(10));
        assert_eq!(task.updated_at, task.created_at);

        task.touch(at(9_000));
        assert_eq!(task.updated_at, at(9_000));
    }

    #[test]
    fn patch_applies_present_fields_even_when_falsy() {
        let mut task = Task::new(TaskId::from("t1"), TaskDraft::new("x"), at(0));
        task.tag = "work".to_string();
        task.details = "notes".to_string();
        task.completed = true;
        task.due_date = Some(parse_due_date("2024-01-01").unwrap());

        let patch = TaskPatch {
            tag: Some(String::new()),
            details: Some(String::new()),
            completed: Some(false),
            due_date: Some(None),
            ..Default::default()
        };
        task.apply(&patch);

        assert_eq!(task.tag, "");
        assert_eq!(task.details, "");
        assert!(!task.completed);
        assert_eq!(task.due_date, None);
        assert_eq!(task.text, "x");
    }

    #[test]
    fn patch_validation_rejects_blank_text_only_when_present() {
        let blank = TaskPatch {
            text: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.validate(), Err(DomainError::EmptyText));

        let untouched = TaskPatch {
            tag: Some(" home ".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(untouched.text, None);
        assert_eq!(untouched.tag.as_deref(), Some("home"));
    }

    #[test]
    fn serializes_with_millisecond_timestamps_and_plain_dates() {
        let mut task = Task::new(TaskId::from("t1"), TaskDraft::new("x"), at(1_700_000_000_000));
        task.due_date = Some(parse_due_date("2024-03-05").unwrap());

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["createdAt"], 1_700_000_000_000_i64);
        assert_eq!(json["dueDate"], "2024-03-05");
        assert_eq!(json["isFavorite"], false);
    }

    #[test]
    fn rejects_malformed_due_date() {
        assert!(matches!(
            parse_due_date("03/05/2024"),
            Err(DomainError::InvalidDate(_))
        ));
    }
}
