use serde_json::Value;

use libs::{
    payload::{
        AddMessagePayload, AddTaskPayload, DeleteTaskPayload, SubmitFormPayload,
        ToggleTaskPayload,
    },
    record::{now_millis, sort_messages, sort_tasks, Message, RecordId, Task},
    Collection,
};

use super::RuntimeError;
use crate::store::{to_fields, Document, DocumentStore};

const IS_COMPLETED: &str = "isCompleted";
const TIMESTAMP: &str = "timestamp";

fn into_records<T: serde::de::DeserializeOwned>(
    documents: Vec<Document>,
) -> Result<Vec<T>, RuntimeError> {
    documents
        .into_iter()
        .map(|doc| doc.into_record::<T>().map_err(RuntimeError::from))
        .collect()
}

pub(crate) async fn perform_get_tasks(
    store: &dyn DocumentStore,
) -> Result<Vec<Task>, RuntimeError> {
    let mut tasks: Vec<Task> = into_records(store.query(Collection::Tasks).await?)?;
    sort_tasks(&mut tasks);
    Ok(tasks)
}

/// New tasks always start incomplete.
pub(crate) async fn perform_add_task(
    payload: AddTaskPayload,
    store: &dyn DocumentStore,
) -> Result<RecordId, RuntimeError> {
    let mut fields = to_fields(&payload)?;
    fields.insert(IS_COMPLETED.to_string(), Value::Bool(false));

    let id = store.insert(Collection::Tasks, fields).await?;
    tracing::info!(%id, title = %payload.title, "task added");
    Ok(id)
}

/// Returns the new completion state.
pub(crate) async fn perform_toggle_task(
    payload: ToggleTaskPayload,
    store: &dyn DocumentStore,
) -> Result<bool, RuntimeError> {
    match store
        .toggle(Collection::Tasks, &payload.id, IS_COMPLETED)
        .await?
    {
        Some(is_completed) => {
            tracing::info!(id = %payload.id, is_completed, "task toggled");
            Ok(is_completed)
        }
        None => Err(RuntimeError::NotFound {
            collection: Collection::Tasks,
            id: payload.id,
        }),
    }
}

/// Deleting an id that resolves to nothing succeeds without a write.
pub(crate) async fn perform_delete_task(
    payload: DeleteTaskPayload,
    store: &dyn DocumentStore,
) -> Result<(), RuntimeError> {
    if store.delete(Collection::Tasks, &payload.id).await? {
        tracing::info!(id = %payload.id, "task deleted");
    } else {
        tracing::debug!(id = %payload.id, "delete: no such task");
    }
    Ok(())
}

pub(crate) async fn perform_get_messages(
    store: &dyn DocumentStore,
) -> Result<Vec<Message>, RuntimeError> {
    let mut messages: Vec<Message> = into_records(store.query(Collection::Messages).await?)?;
    sort_messages(&mut messages);
    Ok(messages)
}

pub(crate) async fn perform_add_message(
    payload: AddMessagePayload,
    store: &dyn DocumentStore,
) -> Result<RecordId, RuntimeError> {
    let mut fields = to_fields(&payload)?;
    fields.insert(TIMESTAMP.to_string(), Value::from(now_millis()));

    let id = store.insert(Collection::Messages, fields).await?;
    tracing::info!(%id, author = %payload.author, "message added");
    Ok(id)
}

pub(crate) async fn perform_submit_form(
    payload: SubmitFormPayload,
    store: &dyn DocumentStore,
) -> Result<RecordId, RuntimeError> {
    let mut fields = to_fields(&payload)?;
    fields.insert(TIMESTAMP.to_string(), Value::from(now_millis()));

    let id = store.insert(Collection::Forms, fields).await?;
    tracing::info!(%id, "form submitted");
    Ok(id)
}
