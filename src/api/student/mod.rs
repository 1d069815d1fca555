//! Routes a student uses to sit an exam.

mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exams", get(handlers::list_exams))
        .route("/exams/:exam_id", get(handlers::view_exam))
        .route("/exams/:exam_id/start", post(handlers::start_attempt))
        .route("/exams/:exam_id/attempt", get(handlers::current_attempt))
        .route("/exams/:exam_id/answers", post(handlers::save_answer))
        .route("/exams/:exam_id/submit", post(handlers::submit_attempt))
        .route("/exams/:exam_id/result", get(handlers::exam_result))
        .route("/performance", get(handlers::performance))
}
