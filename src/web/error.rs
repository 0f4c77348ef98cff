use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::error::CertissueError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Certissue(#[from] CertissueError),

    #[error("Missing or invalid admin token")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn status_of(err: &CertissueError) -> StatusCode {
    use CertissueError::*;

    match err {
        Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DuplicateRollNumber(_) | MissingImage(_) => StatusCode::CONFLICT,
        NotFound(_) | NothingToExport => StatusCode::NOT_FOUND,
        UnknownTemplate(_) | NoPendingStudents | Csv(_) | Spreadsheet(_) => StatusCode::BAD_REQUEST,
        Mail(_) | Upload(_) => StatusCode::BAD_GATEWAY,
        StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Certissue(CertissueError::Validation(fields)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string(), "fields": fields }),
            ),
            ApiError::Certissue(err) => (status_of(err), json!({ "error": err.to_string() })),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Task(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };

        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(body)).into_response()
    }
}
