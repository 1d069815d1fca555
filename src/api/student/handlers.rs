use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::schemas::attempt::{
    AnswerSave, AnswerSavedResponse, AttemptStateResponse, ExamForAttemptResponse,
    ExamListingResponse,
};
use crate::schemas::result::{StudentExamResultResponse, StudentPerformanceResponse};
use crate::services::{answer_register, attempt_lifecycle, catalog, results};

pub(super) async fn list_exams(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamListingResponse>>, ApiError> {
    let listings = catalog::list_accessible_exams(&state, &student.id).await?;
    Ok(Json(listings.into_iter().map(ExamListingResponse::from).collect()))
}

pub(super) async fn view_exam(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<ExamForAttemptResponse>, ApiError> {
    let view = catalog::view_exam_for_attempt(&state, &exam_id, &student.id).await?;
    Ok(Json(view.into()))
}

pub(super) async fn start_attempt(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AttemptStateResponse>), ApiError> {
    let view = attempt_lifecycle::start(&state, &exam_id, &student.id).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

pub(super) async fn current_attempt(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    let view = attempt_lifecycle::current_attempt(&state, &exam_id, &student.id).await?;
    Ok(Json(view.into()))
}

pub(super) async fn save_answer(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<AnswerSave>,
) -> Result<Json<AnswerSavedResponse>, ApiError> {
    payload.validate()?;

    let saved = answer_register::save(
        &state,
        &exam_id,
        &student.id,
        &payload.question_id,
        payload.payload(),
    )
    .await?;
    Ok(Json(saved.into()))
}

pub(super) async fn submit_attempt(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    let view = attempt_lifecycle::submit(&state, &exam_id, &student.id).await?;
    Ok(Json(view.into()))
}

pub(super) async fn exam_result(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<StudentExamResultResponse>, ApiError> {
    let result = results::student_exam_result(&state, &exam_id, &student.id).await?;
    Ok(Json(result.into()))
}

pub(super) async fn performance(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<StudentPerformanceResponse>, ApiError> {
    let performance = results::student_performance(&state, &student.id).await?;
    Ok(Json(performance.into()))
}
