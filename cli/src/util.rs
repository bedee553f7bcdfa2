use libs::payload::ValidationError;
use reqwest::{blocking::Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Error sending request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Error ({status}): {message}")]
    Service { status: StatusCode, message: String },

    #[error("Response carried no data")]
    MissingData,

    #[error("Nothing was sent: {}", list_problems(.0))]
    Invalid(Vec<ValidationError>),
}

fn list_problems(problems: &[ValidationError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Envelope every service response is wrapped in.
#[derive(Serialize, Deserialize, Debug)]
pub struct ServiceResponse<T> {
    pub status: String,
    pub message: Option<String>,
    pub field: Option<String>,
    pub data: Option<T>,
}

pub struct ServiceClient {
    request_client: Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: &str) -> Self {
        ServiceClient {
            request_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Option<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self.request_client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send()?;

        let status = resp.status();
        let body = resp.json::<ServiceResponse<T>>()?;
        tracing::debug!(%status, reply = %body.status, "response");

        if status.is_success() {
            Ok(body.data)
        } else {
            let mut message = body.message.unwrap_or_else(|| "Something went wrong.".to_string());
            if let Some(field) = body.field {
                message = format!("{} (`{}`)", message, field);
            }
            Err(ClientError::Service { status, message })
        }
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<T, ()>(Method::GET, path, None)?
            .ok_or(ClientError::MissingData)
    }

    pub fn post<T, B>(&self, path: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        self.send(Method::POST, path, Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ServiceClient::new("http://localhost:8000/");
        assert_eq!(client.url("/v1/tasks"), "http://localhost:8000/v1/tasks");
    }

    #[test]
    fn test_invalid_lists_every_problem() {
        let err = ClientError::Invalid(vec![
            ValidationError::new("firstName", "must be at least 2 characters"),
            ValidationError::new("email", "must be a valid email address"),
        ]);
        assert_eq!(
            err.to_string(),
            "Nothing was sent: `firstName` must be at least 2 characters; `email` must be a valid email address"
        );
    }

    #[test]
    fn test_error_envelope_parses() {
        let body: ServiceResponse<serde_json::Value> = serde_json::from_value(serde_json::json!({
            "status": "error",
            "message": "Validation failed",
            "field": "title",
            "error": "must not be empty",
        }))
        .unwrap();
        assert_eq!(body.status, "error");
        assert_eq!(body.field.as_deref(), Some("title"));
        assert!(body.data.is_none());
    }
}
