//! Error handler for portico.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

/// Convenience alias for results that fail with a [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
///
/// Dependency-specific failures (record store, identity directory) are
/// translated into this taxonomy where they occur and never cross the
/// service boundary raw.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Request payload failed validation.
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    /// Malformed or otherwise unprocessable request.
    #[error("{0}")]
    BadRequest(String),

    /// JSON extraction rejection from axum.
    #[error(transparent)]
    Axum(#[from] JsonRejection),

    /// Record store (PostgreSQL) failure.
    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    /// Message broker (AMQP) failure.
    #[error("broker request failed: {0}")]
    Lapin(#[from] lapin::Error),

    /// Broker URL used an unsupported scheme.
    #[error("scheme must be amqp or amqps")]
    InvalidScheme,

    /// URL parsing failure.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// JSON serialization or deserialization failure.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// Resource already exists.
    #[error("{entity} already exists")]
    Conflict {
        /// Name of the conflicting entity.
        entity: String,
    },

    /// Resource not found.
    #[error("{entity} not found")]
    NotFound {
        /// Name of the missing entity.
        entity: String,
    },

    /// Operation not allowed for this account.
    #[error("{reason}")]
    Forbidden {
        /// Why the operation was denied.
        reason: String,
    },

    /// Missing or invalid credentials.
    #[error("missing or invalid credentials")]
    Unauthorized,

    /// Unexpected internal failure.
    #[error("internal server error, {details}")]
    Internal {
        /// Human-readable description of the failure.
        details: String,
        /// Underlying error, when one is available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Shortcut for [`ServerError::Conflict`].
    pub fn conflict(entity: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
        }
    }

    /// Shortcut for [`ServerError::NotFound`].
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    /// Shortcut for [`ServerError::Forbidden`].
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Shortcut for [`ServerError::Internal`] without a source error.
    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal {
            details: details.into(),
            source: None,
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => response
                .title("There were validation errors with your request.")
                .errors(validation_errors),

            ServerError::BadRequest(detail) => response.details(detail),

            ServerError::Conflict { .. } => response
                .title("Resource already exists.")
                .status(StatusCode::CONFLICT),

            ServerError::NotFound { .. } => response
                .title("Resource not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Forbidden { .. } => response
                .title("Operation not allowed for this account.")
                .status(StatusCode::FORBIDDEN),

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "store returned 500 status");

                ResponseError::default()
            },

            ServerError::Lapin(err) => {
                tracing::error!(error = %err, "broker returned 500 status");

                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");

                ResponseError::default()
            },

            _ => response,
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
