use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::types::AttemptStatus;
use crate::schemas::attempt::AttemptResponse;
use crate::services::results::{
    ExamResultSummary, RecentAttempt, ScoreStats, StudentExamResult, StudentPerformance,
};

#[derive(Debug, Serialize)]
pub(crate) struct ExamResultSummaryResponse {
    pub(crate) exam_id: String,
    pub(crate) total_students: i64,
    pub(crate) total_attempts: usize,
    #[serde(flatten)]
    pub(crate) stats: ScoreStats,
    pub(crate) pass_rate: f64,
    pub(crate) total_marks: i64,
    pub(crate) attempts: Vec<AttemptResponse>,
}

impl From<ExamResultSummary> for ExamResultSummaryResponse {
    fn from(summary: ExamResultSummary) -> Self {
        Self {
            exam_id: summary.exam_id,
            total_students: summary.total_students,
            total_attempts: summary.total_attempts,
            stats: summary.stats,
            pass_rate: summary.pass_rate,
            total_marks: summary.total_marks,
            attempts: summary.attempts.into_iter().map(AttemptResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RecentAttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<String>,
}

impl From<RecentAttempt> for RecentAttemptResponse {
    fn from(recent: RecentAttempt) -> Self {
        Self {
            attempt_id: recent.attempt_id,
            exam_id: recent.exam_id,
            exam_title: recent.exam_title,
            score: recent.score,
            status: recent.status,
            submitted_at: recent.submitted_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentPerformanceResponse {
    pub(crate) student_id: String,
    pub(crate) total_exams: usize,
    #[serde(flatten)]
    pub(crate) stats: ScoreStats,
    pub(crate) recent_attempts: Vec<RecentAttemptResponse>,
}

impl From<StudentPerformance> for StudentPerformanceResponse {
    fn from(performance: StudentPerformance) -> Self {
        Self {
            student_id: performance.student_id,
            total_exams: performance.total_exams,
            stats: performance.stats,
            recent_attempts: performance
                .recent_attempts
                .into_iter()
                .map(RecentAttemptResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentExamResultResponse {
    pub(crate) exam_id: String,
    pub(crate) attempt_id: String,
    pub(crate) score: f64,
    pub(crate) total_marks: i64,
    pub(crate) percentage: f64,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<String>,
}

impl From<StudentExamResult> for StudentExamResultResponse {
    fn from(result: StudentExamResult) -> Self {
        Self {
            exam_id: result.exam_id,
            attempt_id: result.attempt_id,
            score: result.score,
            total_marks: result.total_marks,
            percentage: result.percentage,
            status: result.status,
            submitted_at: result.submitted_at.map(format_primitive),
        }
    }
}

/// Stored score next to a fresh re-grade of the same answers.
#[derive(Debug, Serialize)]
pub(crate) struct ScoreCheckResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) stored_score: Option<f64>,
    pub(crate) recomputed_score: f64,
    pub(crate) consistent: bool,
}
