//! HTTP mapping of engine failures.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request, rejected before reaching the engine
    BadRequest(String),
    /// A refusal from the engine that carries no retry captcha
    Domain(DomainError),
    /// Any internal fault. Details are logged, never returned.
    Unexpected { report_to: Arc<str> },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_to: Option<&'a str>,
}

impl ApiError {
    /// Maps an engine error, logging internal faults as it goes.
    pub fn from_domain(err: DomainError, report_to: &Arc<str>) -> Self {
        match err {
            DomainError::Internal(detail) => {
                error!(error = %detail, "request failed with an internal error");
                Self::Unexpected {
                    report_to: Arc::clone(report_to),
                }
            }
            other => Self::Domain(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Domain(err) => domain_status(err),
            Self::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status code of a domain error.
pub fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::ThreadNotFound(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-facing message for a domain error.
pub fn domain_message(err: &DomainError) -> String {
    match err {
        DomainError::Validation(msg) | DomainError::Conflict(msg) => msg.clone(),
        DomainError::ThreadNotFound(id) => format!("thread {id} does not exist"),
        DomainError::NotFound(what) => format!("no post matches {what}"),
        DomainError::Internal(_) => "Unexpected error".to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::BadRequest(msg) => (
                status,
                Json(ErrorBody {
                    error: &msg,
                    report_to: None,
                }),
            )
                .into_response(),
            Self::Domain(err) => (
                status,
                Json(ErrorBody {
                    error: &domain_message(&err),
                    report_to: None,
                }),
            )
                .into_response(),
            Self::Unexpected { report_to } => (
                status,
                Json(ErrorBody {
                    error: "Unexpected error",
                    report_to: Some(&report_to),
                }),
            )
                .into_response(),
        }
    }
}
