//! Maps engine errors and extractor rejections to JSON responses.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::engine::{EngineError, ErrorKind};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Json(#[from] JsonRejection),
    #[error("{0}")]
    Query(#[from] QueryRejection),
    #[error("{0}")]
    Path(#[from] PathRejection),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Engine(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log_internal(&self) {
        if self.kind() == ErrorKind::Internal {
            tracing::error!(error = %self, "request failed");
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();
        let error = match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        (self.status(), Json(ErrorBody { error })).into_response()
    }
}

/// Error shape of `POST /api/book`: `{ ok: false, error, details? }`.
#[derive(Debug)]
pub struct BookingError(pub ApiError);

impl From<EngineError> for BookingError {
    fn from(e: EngineError) -> Self {
        Self(e.into())
    }
}

impl From<JsonRejection> for BookingError {
    fn from(e: JsonRejection) -> Self {
        Self(e.into())
    }
}

#[derive(Debug, Serialize)]
struct BookingErrorBody {
    ok: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let inner = self.0;
        inner.log_internal();
        let (error, details) = match inner.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => {
                ("Invalid booking data", Some(inner.to_string()))
            }
            ErrorKind::Conflict => ("Selected hosts are already booked", Some(inner.to_string())),
            ErrorKind::Internal => ("Failed to create booking", None),
        };
        let status = match inner.kind() {
            ErrorKind::NotFound => StatusCode::BAD_REQUEST,
            _ => inner.status(),
        };
        let body = BookingErrorBody {
            ok: false,
            error,
            details,
        };
        (status, Json(body)).into_response()
    }
}
