use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::errors::ExamError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    kind: &'static str,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    Validation(String),
    Exam(ExamError),
}

impl From<ExamError> for ApiError {
    fn from(err: ExamError) -> Self {
        Self::Exam(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

fn exam_status(err: &ExamError) -> StatusCode {
    match err {
        ExamError::AccessDenied(_) => StatusCode::FORBIDDEN,
        ExamError::DuplicateAttempt
        | ExamError::AttemptClosed
        | ExamError::AlreadyClosed
        | ExamError::AttemptExpired
        | ExamError::InvalidState(_) => StatusCode::CONFLICT,
        ExamError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExamError::NotFound(_) => StatusCode::NOT_FOUND,
        ExamError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(status: StatusCode, kind: &'static str, detail: String) -> Response {
    (status, Json(ErrorResponse { status: status.as_u16(), kind, detail })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                respond(StatusCode::UNAUTHORIZED, "unauthorized", message.to_string())
            }
            ApiError::Forbidden(message) => {
                respond(StatusCode::FORBIDDEN, "forbidden", message.to_string())
            }
            ApiError::Validation(message) => {
                respond(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
            }
            ApiError::Exam(ExamError::Store(err)) => {
                tracing::error!(error = %err, "Exam store failure");
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_error",
                    "Internal server error".to_string(),
                )
            }
            ApiError::Exam(err) => respond(exam_status(&err), err.kind(), err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn lifecycle_errors_map_to_http_statuses() {
        let cases = [
            (ExamError::access_denied("no"), StatusCode::FORBIDDEN),
            (ExamError::DuplicateAttempt, StatusCode::CONFLICT),
            (ExamError::AttemptExpired, StatusCode::CONFLICT),
            (ExamError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (ExamError::not_found("gone"), StatusCode::NOT_FOUND),
            (
                ExamError::Store(StoreError::Invariant("two rows".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }
}
