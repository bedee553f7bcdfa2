use std::{convert::Infallible, str::FromStr};

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request as AxumExtractRequest, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Serialize;

use libs::{
    payload::{
        AddMessagePayload, AddTaskPayload, DeleteTaskPayload, SubmitFormPayload,
        ToggleTaskPayload, Validate,
    },
    record::{Message, Task},
    Procedure,
};

use super::{
    construct_err_payload_validation, construct_err_resp_invalid_incoming_json, decode_args,
    live::{Listing, LiveQuery},
    logic::{
        perform_add_message, perform_add_task, perform_delete_task, perform_get_messages,
        perform_get_tasks, perform_submit_form, perform_toggle_task,
    },
    seed::perform_seed,
    NoArgs, RpcRequest, RuntimeError,
};
use crate::{store::DocumentStore, AppState};

/// JSON body extractor that also runs the payload's semantic checks.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: Validate,
    S: Send + Sync,
{
    type Rejection = (StatusCode, axum::Json<serde_json::Value>);

    async fn from_request(req: AxumExtractRequest, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(json) => match json.0.validate() {
                Ok(()) => Ok(Self(json.0)),
                Err(err) => {
                    tracing::error!("invalid payload: {}", err);
                    Err((
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(construct_err_payload_validation(&err)),
                    ))
                }
            },
            Err(rejection) => {
                tracing::error!("{:?}", rejection);
                Err(construct_err_resp_invalid_incoming_json(&rejection))
            }
        }
    }
}

fn ok_response() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
    }))
}

fn ok_data_response(data: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "data": data,
    }))
}

pub async fn get_tasks(
    State(app_state): State<AppState>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let tasks = perform_get_tasks(app_state.store.as_ref()).await?;
    Ok(ok_data_response(serde_json::json!({ "tasks": tasks })))
}

pub async fn add_task(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AddTaskPayload>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let id = perform_add_task(payload, app_state.store.as_ref()).await?;
    Ok(ok_data_response(serde_json::json!({ "id": id })))
}

pub async fn toggle_task(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ToggleTaskPayload>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let is_completed = perform_toggle_task(payload, app_state.store.as_ref()).await?;
    Ok(ok_data_response(
        serde_json::json!({ "isCompleted": is_completed }),
    ))
}

pub async fn delete_task(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DeleteTaskPayload>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    perform_delete_task(payload, app_state.store.as_ref()).await?;
    Ok(ok_response())
}

pub async fn get_messages(
    State(app_state): State<AppState>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let messages = perform_get_messages(app_state.store.as_ref()).await?;
    Ok(ok_data_response(serde_json::json!({ "messages": messages })))
}

pub async fn add_message(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AddMessagePayload>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let id = perform_add_message(payload, app_state.store.as_ref()).await?;
    Ok(ok_data_response(serde_json::json!({ "id": id })))
}

pub async fn submit_form(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SubmitFormPayload>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let id = perform_submit_form(payload, app_state.store.as_ref()).await?;
    Ok(ok_data_response(serde_json::json!({ "id": id })))
}

pub async fn seed(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let report = perform_seed(app_state.store.as_ref()).await;
    ok_data_response(serde_json::json!({ "report": report }))
}

async fn dispatch(
    procedure: Procedure,
    args: serde_json::Value,
    store: &dyn DocumentStore,
) -> Result<serde_json::Value, RuntimeError> {
    let data = match procedure {
        Procedure::GetTasks => {
            decode_args::<NoArgs>(args)?;
            serde_json::json!({ "tasks": perform_get_tasks(store).await? })
        }
        Procedure::AddTask => {
            let id = perform_add_task(decode_args(args)?, store).await?;
            serde_json::json!({ "id": id })
        }
        Procedure::ToggleTaskStatus => {
            let is_completed = perform_toggle_task(decode_args(args)?, store).await?;
            serde_json::json!({ "isCompleted": is_completed })
        }
        Procedure::DeleteTask => {
            perform_delete_task(decode_args(args)?, store).await?;
            serde_json::Value::Null
        }
        Procedure::GetMessages => {
            decode_args::<NoArgs>(args)?;
            serde_json::json!({ "messages": perform_get_messages(store).await? })
        }
        Procedure::AddMessage => {
            let id = perform_add_message(decode_args(args)?, store).await?;
            serde_json::json!({ "id": id })
        }
        Procedure::SubmitForm => {
            let id = perform_submit_form(decode_args(args)?, store).await?;
            serde_json::json!({ "id": id })
        }
        Procedure::Seed => {
            decode_args::<NoArgs>(args)?;
            serde_json::json!({ "report": perform_seed(store).await })
        }
    };
    Ok(data)
}

/// Runs any named procedure: `{"procedure": "tasks:addTask", "args": {...}}`.
pub async fn rpc(
    State(app_state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RpcRequest>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let procedure = Procedure::from_str(&request.procedure).map_err(|_| {
        tracing::error!("unknown procedure: {}", request.procedure);
        RuntimeError::UnprocessableEntity {
            name: "procedure".to_string(),
        }
    })?;
    tracing::info!(%procedure, kind = %procedure.kind(), "rpc");

    let data = dispatch(procedure, request.args, app_state.store.as_ref()).await?;
    if data.is_null() {
        Ok(ok_response())
    } else {
        Ok(ok_data_response(data))
    }
}

fn live_events<T>(
    app_state: AppState,
    event_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Listing + Serialize,
{
    let stream = LiveQuery::<T>::new(app_state.store)
        .into_stream()
        .map(move |snapshot| {
            let event = match snapshot {
                Ok(records) => Event::default().event(event_name).json_data(
                    serde_json::json!({
                        "status": "ok",
                        "data": { event_name: records },
                    }),
                ),
                Err(err) => {
                    tracing::error!("live {} query failed: {}", event_name, err);
                    Event::default().event("error").json_data(serde_json::json!({
                        "status": "error",
                        "message": err.to_string(),
                    }))
                }
            };
            Ok(event.unwrap_or_else(|err| Event::default().event("error").data(err.to_string())))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn live_tasks(
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    live_events::<Task>(app_state, "tasks")
}

pub async fn live_messages(
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    live_events::<Message>(app_state, "messages")
}
