use std::fmt;

use actix_web::{http::StatusCode, HttpResponse};

use crate::core::store::StoreError;

/// Outcome taxonomy for every coordinator operation.
///
/// Owner mismatch on update/delete is deliberately reported as `NotFound`,
/// indistinguishable from a missing entity, so existence is never leaked.
#[derive(Debug, PartialEq)]
pub enum ApiError {
    BadRequest(String),
    /// Validation failure enumerating the required fields that were absent.
    MissingFields(Vec<&'static str>),
    Unauthorized,
    NotFound(String),
    Conflict(String),
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::MissingFields(fields) => {
                write!(f, "Please fill in all fields: {}", fields.join(", "))
            }
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn body(&self) -> serde_json::Value {
        match self {
            ApiError::BadRequest(msg) => serde_json::json!({ "error": msg }),
            ApiError::MissingFields(fields) => serde_json::json!({
                "error": "Please fill in all fields.",
                "emptyFields": fields,
            }),
            ApiError::Unauthorized => serde_json::json!({ "error": "Unauthorized" }),
            ApiError::NotFound(msg) => serde_json::json!({ "error": msg }),
            ApiError::Conflict(msg) => serde_json::json!({ "error": msg }),
            // Internal detail stays in the logs, not the response.
            ApiError::InternalError(_) => serde_json::json!({ "error": "Internal server error" }),
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::MissingFields(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::InternalError(msg) = self {
            tracing::error!(error = %msg, "internal failure");
        }
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(what) => ApiError::Conflict(format!("{} already in use.", what)),
            StoreError::Backend(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
