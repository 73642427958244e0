//! HTTP error responses.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::error::{BillsplitError, ErrorKind, ExtractionError};

/// An error returned by a handler.
#[derive(Debug)]
pub enum ApiError {
    Bill(BillsplitError),
    /// The multipart body had no part with the expected field name.
    NoFileUploaded,
    /// The request body or path could not be read.
    BadRequest(String),
}

impl From<BillsplitError> for ApiError {
    fn from(err: BillsplitError) -> Self {
        ApiError::Bill(err)
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        ApiError::Bill(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoFileUploaded | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Bill(BillsplitError::SplitNotBalanced { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Bill(BillsplitError::Extraction(
                ExtractionError::UnsupportedMediaType(_) | ExtractionError::Document(_),
            )) => StatusCode::BAD_REQUEST,
            ApiError::Bill(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Extraction => StatusCode::BAD_GATEWAY,
                ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Name reported in the `error` field of the body.
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::NoFileUploaded => "NoFileUploaded",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Bill(err) => match err {
                BillsplitError::EmptyPersonName => "EmptyPersonName",
                BillsplitError::DuplicateName(_) => "DuplicateName",
                BillsplitError::EmptyItemName => "EmptyItemName",
                BillsplitError::InvalidPrice(_) => "InvalidPrice",
                BillsplitError::InvalidPercentage { .. } => "InvalidPercentage",
                BillsplitError::DuplicateSplitEntry(_) => "DuplicateSplitEntry",
                BillsplitError::SplitNotBalanced { .. } => "SplitNotBalanced",
                BillsplitError::IndexOutOfRange { .. } => "IndexOutOfRange",
                BillsplitError::PersonNotFound(_) => "PersonNotFound",
                BillsplitError::HistoryEntryNotFound { .. } => "HistoryEntryNotFound",
                BillsplitError::Extraction(e) => match e {
                    ExtractionError::MissingApiKey => "MissingApiKey",
                    ExtractionError::UnsupportedMediaType(_) => "UnsupportedMediaType",
                    ExtractionError::Document(_) => "DocumentUnreadable",
                    ExtractionError::Transport(_) | ExtractionError::Upstream { .. } => {
                        "ExtractionServiceFailed"
                    }
                    ExtractionError::EmptyResponse
                    | ExtractionError::NotJson(_)
                    | ExtractionError::InvalidShape(_) => "ExtractionParsingFailed",
                },
                BillsplitError::Storage(_)
                | BillsplitError::Io(_)
                | BillsplitError::Json(_)
                | BillsplitError::Config(_)
                | BillsplitError::Sqlite(_) => "StorageError",
            },
        }
    }

    fn details(&self) -> String {
        match self {
            ApiError::NoFileUploaded => "No file uploaded".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Bill(err) => err.to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.details())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        let body = json!({
            "success": false,
            "error": self.error_type(),
            "details": self.details(),
        });
        (status, Json(body)).into_response()
    }
}
