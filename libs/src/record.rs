use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

pub fn now_millis() -> EpochMillis {
    chrono::offset::Utc::now().timestamp_millis()
}

/// Opaque identifier assigned by the store when a document is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        RecordId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId(value.to_string())
    }
}

/// Conventional task priorities. The store keeps `priority` as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(rename = "_creationTime")]
    pub creation_time: EpochMillis,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<EpochMillis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// Orders tasks incomplete first, then by due date ascending.
///
/// Tasks without a due date come before dated ones within the same
/// completion group. Remaining ties fall back to creation order.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.is_completed
            .cmp(&b.is_completed)
            .then_with(|| a.due_date.cmp(&b.due_date))
            .then_with(|| a.creation_time.cmp(&b.creation_time))
    });
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(rename = "_creationTime")]
    pub creation_time: EpochMillis,
    pub text: String,
    pub author: String,
    pub timestamp: EpochMillis,
}

/// Orders messages most recent first.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.creation_time.cmp(&a.creation_time))
    });
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(rename = "_creationTime")]
    pub creation_time: EpochMillis,
    pub name: String,
    pub email: String,
    pub message: String,
    pub timestamp: EpochMillis,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn task(id: &str, is_completed: bool, due_date: Option<EpochMillis>, created: i64) -> Task {
        Task {
            id: RecordId::from(id),
            creation_time: created,
            title: id.to_string(),
            description: "desc".to_string(),
            is_completed,
            due_date,
            assigned_to: None,
            priority: None,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_sort_tasks_incomplete_first_then_due_date() {
        let mut tasks = vec![
            task("A", false, Some(2_000), 1),
            task("B", true, Some(1_000), 2),
            task("C", false, Some(1_000), 3),
        ];
        sort_tasks(&mut tasks);
        assert_eq!(ids(&tasks), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_sort_tasks_missing_due_date_first() {
        let mut tasks = vec![
            task("dated", false, Some(5), 1),
            task("undated", false, None, 2),
            task("done", true, None, 0),
        ];
        sort_tasks(&mut tasks);
        assert_eq!(ids(&tasks), vec!["undated", "dated", "done"]);
    }

    #[test]
    fn test_sort_messages_newest_first() {
        let message = |id: &str, timestamp: i64| Message {
            id: RecordId::from(id),
            creation_time: timestamp,
            text: "hi".to_string(),
            author: "Sam".to_string(),
            timestamp,
        };
        let mut messages = vec![message("old", 10), message("new", 30), message("mid", 20)];
        sort_messages(&mut messages);
        let order: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_task_wire_format() {
        let mut t = task("abc", false, Some(42), 7);
        t.assigned_to = Some("Sarah".to_string());
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "_id": "abc",
                "_creationTime": 7,
                "title": "abc",
                "description": "desc",
                "isCompleted": false,
                "dueDate": 42,
                "assignedTo": "Sarah",
            })
        );
        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_record_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::from_str("high").unwrap(), Priority::High);
        assert_eq!(Priority::Medium.to_string(), "Medium");
    }
}
