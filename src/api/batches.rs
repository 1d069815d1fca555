use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use serde::Serialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::core::state::AppState;
use crate::services::errors::ExamError;
use crate::services::exam_admin;

#[derive(Debug, Serialize)]
struct MembershipResponse {
    batch_id: String,
    student_id: String,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:batch_id/students/:student_id", put(add_member).delete(remove_member))
}

/// Enrolment is idempotent: a repeated PUT answers 200 instead of 201.
async fn add_member(
    Path((batch_id, student_id)): Path<(String, String)>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<MembershipResponse>), ApiError> {
    let added = exam_admin::add_member(&state, &batch_id, &student_id).await?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(MembershipResponse { batch_id, student_id })))
}

async fn remove_member(
    Path((batch_id, student_id)): Path<(String, String)>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if exam_admin::remove_member(&state, &batch_id, &student_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ExamError::not_found("Student is not a member of this batch").into())
    }
}
