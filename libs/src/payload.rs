use serde::{Deserialize, Serialize};

use crate::record::{EpochMillis, RecordId};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("`{field}` {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: &'static str) -> Self {
        ValidationError { field, reason }
    }
}

/// Semantic checks that run after a payload has been deserialized and
/// before the entry point body.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddTaskPayload {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<EpochMillis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl Validate for AddTaskPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)?;
        require_non_empty("description", &self.description)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToggleTaskPayload {
    pub id: RecordId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeleteTaskPayload {
    pub id: RecordId,
}

impl Validate for ToggleTaskPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("id", self.id.as_str())
    }
}

impl Validate for DeleteTaskPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("id", self.id.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AddMessagePayload {
    pub text: String,
    pub author: String,
}

impl Validate for AddMessagePayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("text", &self.text)?;
        require_non_empty("author", &self.author)
    }
}

/// Contact inquiry. Fields only have to be present; format checks belong
/// to whoever collects the input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubmitFormPayload {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl Validate for SubmitFormPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
