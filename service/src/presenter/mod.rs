use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use libs::{
    payload::{Validate, ValidationError},
    record::RecordId,
    Collection,
};

use crate::store::StoreError;

pub mod handlers;
pub mod live;
pub mod logic;
pub mod seed;

/// One call through `/v1/rpc`: a procedure name such as `tasks:addTask` and
/// its arguments.
#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct RpcRequest {
    pub procedure: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl Validate for RpcRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Argument shape of procedures that take none.
#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

impl Validate for NoArgs {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("{collection} record `{id}` not found")]
    NotFound { collection: Collection, id: RecordId },

    #[error("Invalid payload")]
    UnprocessableEntity { name: String },
}

impl IntoResponse for RuntimeError {
    fn into_response(self) -> axum::response::Response {
        match self {
            RuntimeError::StoreError(err) => {
                let status = match err {
                    StoreError::PoolTimedOut => StatusCode::SERVICE_UNAVAILABLE,
                    StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let err_payload = construct_err_payload_store(err);
                (status, Json(err_payload)).into_response()
            }
            RuntimeError::Validation(err) => {
                let err_payload = construct_err_payload_validation(&err);
                (StatusCode::UNPROCESSABLE_ENTITY, Json(err_payload)).into_response()
            }
            RuntimeError::InvalidArguments(err) => {
                let err_payload = serde_json::json!({
                    "status": "error",
                    "message": "Validation failed",
                    "error": err.to_string(),
                });
                (StatusCode::UNPROCESSABLE_ENTITY, Json(err_payload)).into_response()
            }
            err @ RuntimeError::NotFound { .. } => {
                let err_payload = serde_json::json!({
                    "status": "error",
                    "message": err.to_string(),
                });
                (StatusCode::NOT_FOUND, Json(err_payload)).into_response()
            }
            RuntimeError::UnprocessableEntity { name } => {
                let err_payload = construct_err_payload_unprocessable_entity(name);
                (StatusCode::UNPROCESSABLE_ENTITY, Json(err_payload)).into_response()
            }
        }
    }
}

fn construct_err_payload_unprocessable_entity(name: String) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "message": "Unprocessable entity",
        "field": name,
    })
}

fn construct_err_payload_validation(err: &ValidationError) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "message": "Validation failed",
        "field": err.field,
        "error": err.reason,
    })
}

fn construct_err_payload_store(err: StoreError) -> serde_json::Value {
    match err {
        StoreError::Malformed(err) => {
            tracing::error!(
                "upstream data malformed: it has been modified, and now is in incorrect format"
            );
            tracing::debug!("upstream de err: {:?}", err);
            serde_json::json!({
                "status": "error",
                "message": "Internal Error - Please report an issue if you encounter this."
            })
        }
        err => {
            tracing::error!("store err: {:?}", err);
            serde_json::json!({
                "status": "error",
                "message": err.to_string(),
            })
        }
    }
}

fn construct_err_resp_invalid_incoming_json(
    err: &JsonRejection,
) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        case @ JsonRejection::JsonDataError(_) => {
            tracing::error!("rejected json: {:?}", case);
            let p = serde_json::json!({
                "status": "error",
                "message": "Validation failed",
                "error": case.body_text(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(p))
        }
        JsonRejection::JsonSyntaxError(e) => {
            tracing::error!("invalid json: {:?}", e);
            let p = serde_json::json!({
                "status": "error",
                "message": "Invalid JSON",
            });
            (StatusCode::BAD_REQUEST, Json(p))
        }
        other => {
            let p = serde_json::json!({
                "status": "error",
                "message": other.body_text(),
            });
            (other.status(), Json(p))
        }
    }
}

/// Decodes procedure arguments against their exact shape, then runs the
/// semantic checks. A missing `args` counts as `{}`.
pub fn decode_args<T>(args: serde_json::Value) -> Result<T, RuntimeError>
where
    T: DeserializeOwned + Validate,
{
    let args = if args.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        args
    };
    let payload: T = serde_json::from_value(args)?;
    payload.validate()?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use libs::payload::{AddMessagePayload, AddTaskPayload};

    use super::*;

    #[test]
    fn test_decode_args_null_is_empty() {
        assert!(decode_args::<NoArgs>(serde_json::Value::Null).is_ok());
        assert!(matches!(
            decode_args::<NoArgs>(serde_json::json!({"limit": 10})),
            Err(RuntimeError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_decode_args_runs_validation() {
        let res = decode_args::<AddMessagePayload>(serde_json::json!({
            "text": "",
            "author": "Sam",
        }));
        assert!(matches!(res, Err(RuntimeError::Validation(err)) if err.field == "text"));

        let res = decode_args::<AddTaskPayload>(serde_json::json!({"title": "only"}));
        assert!(matches!(res, Err(RuntimeError::InvalidArguments(_))));
    }

    #[test]
    fn test_error_status_codes() {
        let not_found = RuntimeError::NotFound {
            collection: Collection::Tasks,
            id: RecordId::from("x"),
        };
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = RuntimeError::Validation(ValidationError::new("title", "must not be empty"));
        assert_eq!(
            invalid.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let gone = RuntimeError::StoreError(StoreError::NotFound {
            collection: Collection::Tasks,
            id: RecordId::from("x"),
        });
        assert_eq!(gone.into_response().status(), StatusCode::NOT_FOUND);

        let busy = RuntimeError::StoreError(StoreError::PoolTimedOut);
        assert_eq!(
            busy.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
