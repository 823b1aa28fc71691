//! Response envelope and error mapping.
//!
//! Every control-plane answer, and every routing failure, is wrapped as
//!
//! ```json
//! {"message": <payload>, "status": "successful" | "failure"}
//! ```
//!
//! Validation failures carry `{"<Error>": "<text>"}` as the message; every
//! other failure carries the error text as a plain string.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use corelib::Error;
use serde::{Deserialize, Serialize};

/// Outcome marker of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Successful,
    Failure,
}

/// `{"message": .., "status": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message: T,
    pub status: Status,
}

impl<T: Serialize> Envelope<T> {
    pub fn successful(message: T) -> Self {
        Self {
            message,
            status: Status::Successful,
        }
    }
}

impl Envelope<FailureMessage> {
    pub fn failure(message: FailureMessage) -> Self {
        Self {
            message,
            status: Status::Failure,
        }
    }
}

/// Message body of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailureMessage {
    Detail {
        #[serde(rename = "<Error>")]
        error: String,
    },
    Text(String),
}

/// A core error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// HTTP status for the wrapped error.
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::EndpointNotServed { .. } => StatusCode::BAD_REQUEST,
            Error::RingFull { .. } | Error::InsufficientServers { .. } => StatusCode::CONFLICT,
            Error::NotFound | Error::BackendNotRegistered(_) => StatusCode::NOT_FOUND,
            Error::ForwardingFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::ProvisioningFailed { .. } | Error::InvalidConfig(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::LockTimeout(_) | Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn envelope(&self) -> Envelope<FailureMessage> {
        let message = match &self.0 {
            Error::Validation(text) => FailureMessage::Detail {
                error: text.clone(),
            },
            other => FailureMessage::Text(other.to_string()),
        };
        Envelope::failure(message)
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::ServerId;
    use serde_json::json;

    #[test]
    fn test_validation_uses_error_key() {
        let err = ApiError(Error::validation(
            "Length of hostname list is more than newly added instances",
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(err.envelope()).unwrap(),
            json!({
                "message": {"<Error>": "Length of hostname list is more than newly added instances"},
                "status": "failure"
            })
        );
    }

    #[test]
    fn test_other_errors_are_text() {
        let err = ApiError(Error::EndpointNotServed {
            path: "/other".into(),
        });
        assert_eq!(
            serde_json::to_value(err.envelope()).unwrap(),
            json!({
                "message": "'/other' endpoint does not exist in server replicas",
                "status": "failure"
            })
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                Error::RingFull {
                    server: ServerId(1),
                    placed: 3,
                    required: 9,
                },
                StatusCode::CONFLICT,
            ),
            (
                Error::InsufficientServers {
                    requested: 4,
                    removed: 2,
                },
                StatusCode::CONFLICT,
            ),
            (Error::NotFound, StatusCode::NOT_FOUND),
            (
                Error::ForwardingFailed {
                    hostname: "h".into(),
                    reason: "refused".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (Error::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status_code(), status);
        }
    }

    #[test]
    fn test_failure_message_parses_both_shapes() {
        let detail: Envelope<FailureMessage> =
            serde_json::from_str(r#"{"message":{"<Error>":"bad"},"status":"failure"}"#).unwrap();
        assert_eq!(
            detail.message,
            FailureMessage::Detail {
                error: "bad".into()
            }
        );
        let text: Envelope<FailureMessage> =
            serde_json::from_str(r#"{"message":"down","status":"failure"}"#).unwrap();
        assert_eq!(text.message, FailureMessage::Text("down".into()));
    }
}
