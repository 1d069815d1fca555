use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::core::state::AppState;
use crate::schemas::exam::{ExamCreate, ExamResponse};
use crate::schemas::result::{ExamResultSummaryResponse, ScoreCheckResponse};
use crate::services::{attempt_lifecycle, exam_admin, results};

pub(super) async fn create_exam(
    _staff: CurrentStaff,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate()?;

    let exam = exam_admin::create_exam(&state, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(exam.into())))
}

pub(super) async fn get_exam(
    Path(exam_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = attempt_lifecycle::load_exam(&state, &exam_id).await?;
    Ok(Json(exam.into()))
}

pub(super) async fn publish_exam(
    Path(exam_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = exam_admin::publish_exam(&state, &exam_id).await?;
    Ok(Json(exam.into()))
}

pub(super) async fn complete_exam(
    Path(exam_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = exam_admin::complete_exam(&state, &exam_id).await?;
    Ok(Json(exam.into()))
}

pub(super) async fn delete_exam(
    Path(exam_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    exam_admin::delete_exam(&state, &exam_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn exam_results(
    Path(exam_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<ExamResultSummaryResponse>, ApiError> {
    let summary = results::exam_result_summary(&state, &exam_id).await?;
    Ok(Json(summary.into()))
}

pub(super) async fn score_check(
    Path((exam_id, student_id)): Path<(String, String)>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<ScoreCheckResponse>, ApiError> {
    let attempt = attempt_lifecycle::load_attempt(&state, &exam_id, &student_id).await?;
    let recomputed_score = attempt_lifecycle::recompute_score(&state, &attempt).await?;
    if attempt.score != Some(recomputed_score) {
        tracing::warn!(
            attempt_id = %attempt.id,
            stored = ?attempt.score,
            recomputed = recomputed_score,
            "Stored score differs from re-grade"
        );
    }

    Ok(Json(ScoreCheckResponse {
        consistent: attempt.score == Some(recomputed_score),
        attempt_id: attempt.id,
        status: attempt.status,
        stored_score: attempt.score,
        recomputed_score,
    }))
}
