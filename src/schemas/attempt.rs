use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Answer, Attempt};
use crate::db::types::AttemptStatus;
use crate::schemas::exam::ExamResponse;
use crate::services::answer_register::{AnswerPayload, SavedAnswer};
use crate::services::attempt_lifecycle::AttemptView;
use crate::services::catalog::{ExamForAttempt, ExamListing, StudentQuestion};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSave {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default, alias = "selectedOptionId")]
    pub(crate) selected_option_id: Option<String>,
    #[serde(default, alias = "answerText")]
    #[validate(length(max = 20000, message = "answer_text is too long"))]
    pub(crate) answer_text: Option<String>,
}

impl AnswerSave {
    pub(crate) fn payload(&self) -> AnswerPayload {
        AnswerPayload {
            selected_option_id: self.selected_option_id.clone(),
            answer_text: self.answer_text.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) score: Option<f64>,
}

impl From<Attempt> for AttemptResponse {
    fn from(attempt: Attempt) -> Self {
        Self {
            id: attempt.id,
            exam_id: attempt.exam_id,
            student_id: attempt.student_id,
            status: attempt.status,
            started_at: format_primitive(attempt.started_at),
            submitted_at: attempt.submitted_at.map(format_primitive),
            score: attempt.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptStateResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) remaining_minutes: i64,
}

impl From<AttemptView> for AttemptStateResponse {
    fn from(view: AttemptView) -> Self {
        Self { attempt: view.attempt.into(), remaining_minutes: view.remaining_minutes }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) answer_text: Option<String>,
    pub(crate) updated_at: String,
}

impl From<Answer> for AnswerResponse {
    fn from(answer: Answer) -> Self {
        Self {
            id: answer.id,
            question_id: answer.question_id,
            selected_option_id: answer.selected_option_id,
            answer_text: answer.answer_text,
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerSavedResponse {
    pub(crate) answer: AnswerResponse,
    pub(crate) remaining_minutes: i64,
}

impl From<SavedAnswer> for AnswerSavedResponse {
    fn from(saved: SavedAnswer) -> Self {
        Self { answer: saved.answer.into(), remaining_minutes: saved.remaining_minutes }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamListingResponse {
    #[serde(flatten)]
    pub(crate) exam: ExamResponse,
    pub(crate) total_marks: i64,
    pub(crate) is_accessible: bool,
    pub(crate) has_attempted: bool,
}

impl From<ExamListing> for ExamListingResponse {
    fn from(listing: ExamListing) -> Self {
        Self {
            exam: listing.exam.into(),
            total_marks: listing.total_marks,
            is_accessible: listing.is_accessible,
            has_attempted: listing.has_attempted,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamForAttemptResponse {
    pub(crate) exam: ExamResponse,
    pub(crate) total_marks: i64,
    pub(crate) questions: Vec<StudentQuestion>,
}

impl From<ExamForAttempt> for ExamForAttemptResponse {
    fn from(view: ExamForAttempt) -> Self {
        Self { exam: view.exam.into(), total_marks: view.total_marks, questions: view.questions }
    }
}
