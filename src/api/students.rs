use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::core::state::AppState;
use crate::schemas::result::StudentPerformanceResponse;
use crate::services::results;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:student_id/performance", get(student_performance))
}

async fn student_performance(
    Path(student_id): Path<String>,
    _staff: CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<StudentPerformanceResponse>, ApiError> {
    let performance = results::student_performance(&state, &student_id).await?;
    Ok(Json(performance.into()))
}
