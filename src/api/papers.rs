use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::core::state::AppState;
use crate::schemas::exam::{PaperCreate, PaperResponse, QuestionCreate, QuestionResponse};
use crate::services::exam_admin;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_paper))
        .route("/:paper_id", get(get_paper))
        .route("/:paper_id/questions", post(add_question))
        .route("/:paper_id/questions/:question_id", delete(remove_question))
}

async fn create_paper(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    Json(payload): Json<PaperCreate>,
) -> Result<(StatusCode, Json<PaperResponse>), ApiError> {
    payload.validate()?;

    let paper =
        exam_admin::create_paper(&state, payload.title.trim(), payload.subject, &staff.id).await?;
    Ok((StatusCode::CREATED, Json(PaperResponse::empty(paper))))
}

async fn get_paper(
    Path(paper_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<PaperResponse>, ApiError> {
    let detail = exam_admin::paper_detail(&state, &paper_id).await?;
    Ok(Json(detail.into()))
}

async fn add_question(
    Path(paper_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate()?;

    let question = exam_admin::add_question(&state, &paper_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(question.into())))
}

async fn remove_question(
    Path((paper_id, question_id)): Path<(String, String)>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    exam_admin::remove_question(&state, &paper_id, &question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
