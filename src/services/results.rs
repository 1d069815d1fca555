use serde::Serialize;
use time::PrimitiveDateTime;

use crate::core::state::AppState;
use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;
use crate::services::attempt_lifecycle;
use crate::services::errors::{ExamError, ExamResult};
use crate::services::grading::total_marks;

const RECENT_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub(crate) struct ScoreStats {
    pub(crate) average_score: Option<f64>,
    pub(crate) highest_score: Option<f64>,
    pub(crate) lowest_score: Option<f64>,
}

impl ScoreStats {
    pub(crate) fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let sum: f64 = scores.iter().sum();
        Self {
            average_score: Some(sum / scores.len() as f64),
            highest_score: scores.iter().copied().reduce(f64::max),
            lowest_score: scores.iter().copied().reduce(f64::min),
        }
    }
}

fn closed_scores(attempts: &[Attempt]) -> Vec<f64> {
    attempts.iter().map(|attempt| attempt.score.unwrap_or(0.0)).collect()
}

#[derive(Debug, Clone)]
pub(crate) struct ExamResultSummary {
    pub(crate) exam_id: String,
    pub(crate) total_students: i64,
    pub(crate) total_attempts: usize,
    pub(crate) stats: ScoreStats,
    pub(crate) pass_rate: f64,
    pub(crate) total_marks: i64,
    pub(crate) attempts: Vec<Attempt>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecentAttempt {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone)]
pub(crate) struct StudentPerformance {
    pub(crate) student_id: String,
    pub(crate) total_exams: usize,
    pub(crate) stats: ScoreStats,
    pub(crate) recent_attempts: Vec<RecentAttempt>,
}

#[derive(Debug, Clone)]
pub(crate) struct StudentExamResult {
    pub(crate) exam_id: String,
    pub(crate) attempt_id: String,
    pub(crate) score: f64,
    pub(crate) total_marks: i64,
    pub(crate) percentage: f64,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
}

/// Aggregates over the exam's closed attempts. Total marks belong to the
/// exam's paper and are computed once for the whole set.
pub(crate) async fn exam_result_summary(
    state: &AppState,
    exam_id: &str,
) -> ExamResult<ExamResultSummary> {
    let exam = attempt_lifecycle::load_exam(state, exam_id).await?;
    let attempts = state.store().list_closed_attempts_for_exam(&exam.id).await?;
    let total_students = state.store().count_batch_members(&exam.batch_id).await?;
    let total_marks = total_marks(&state.store().list_questions(&exam.paper_id).await?);

    let scores = closed_scores(&attempts);
    Ok(ExamResultSummary {
        exam_id: exam.id,
        total_students,
        total_attempts: attempts.len(),
        stats: ScoreStats::from_scores(&scores),
        pass_rate: state.grading().pass_rate(&scores, total_marks),
        total_marks,
        attempts,
    })
}

pub(crate) async fn student_performance(
    state: &AppState,
    student_id: &str,
) -> ExamResult<StudentPerformance> {
    // Store returns closed attempts newest first.
    let attempts = state.store().list_closed_attempts_for_student(student_id).await?;
    let scores = closed_scores(&attempts);

    let mut recent_attempts = Vec::with_capacity(RECENT_ATTEMPTS);
    for attempt in attempts.iter().take(RECENT_ATTEMPTS) {
        let exam_title =
            state.store().find_exam(&attempt.exam_id).await?.map(|exam| exam.title);
        recent_attempts.push(RecentAttempt {
            attempt_id: attempt.id.clone(),
            exam_id: attempt.exam_id.clone(),
            exam_title,
            score: attempt.score,
            status: attempt.status,
            submitted_at: attempt.submitted_at,
        });
    }

    Ok(StudentPerformance {
        student_id: student_id.to_string(),
        total_exams: attempts.len(),
        stats: ScoreStats::from_scores(&scores),
        recent_attempts,
    })
}

pub(crate) async fn student_exam_result(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> ExamResult<StudentExamResult> {
    let view = attempt_lifecycle::current_attempt(state, exam_id, student_id).await?;
    let attempt = view.attempt;
    if !attempt.status.is_terminal() {
        return Err(ExamError::not_found("Result is available once the attempt is submitted"));
    }

    let exam = attempt_lifecycle::load_exam(state, exam_id).await?;
    let total_marks = total_marks(&state.store().list_questions(&exam.paper_id).await?);
    let score = attempt.score.unwrap_or(0.0);
    let percentage = if total_marks > 0 { score / total_marks as f64 * 100.0 } else { 0.0 };

    Ok(StudentExamResult {
        exam_id: exam.id,
        attempt_id: attempt.id,
        score,
        total_marks,
        percentage,
        status: attempt.status,
        submitted_at: attempt.submitted_at,
    })
}
