//! Staff-side exam management and reporting.

mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_exam))
        .route("/:exam_id", get(handlers::get_exam).delete(handlers::delete_exam))
        .route("/:exam_id/publish", post(handlers::publish_exam))
        .route("/:exam_id/complete", post(handlers::complete_exam))
        .route("/:exam_id/results", get(handlers::exam_results))
        .route("/:exam_id/attempts/:student_id/score", get(handlers::score_check))
}

#[cfg(test)]
mod tests;
