use uuid::Uuid;

use crate::core::metrics::ANSWERS_SAVED;
use crate::core::state::AppState;
use crate::db::models::{Answer, PaperQuestion};
use crate::db::types::QuestionKind;
use crate::services::attempt_lifecycle::{self, remaining_minutes};
use crate::services::errors::{ExamError, ExamResult};
use crate::store::{AnswerWrite, Guarded, Refusal};

#[derive(Debug, Clone, Default)]
pub(crate) struct AnswerPayload {
    pub(crate) selected_option_id: Option<String>,
    pub(crate) answer_text: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct SavedAnswer {
    pub(crate) answer: Answer,
    pub(crate) remaining_minutes: i64,
}

/// Checks the payload shape against the question kind.
pub(crate) fn validate_payload(
    question: &PaperQuestion,
    payload: &AnswerPayload,
) -> ExamResult<()> {
    match question.question.kind {
        QuestionKind::Objective => {
            if payload.answer_text.is_some() {
                return Err(ExamError::validation("Objective questions take a selected option"));
            }
            if let Some(option_id) = payload.selected_option_id.as_deref() {
                if question.option(option_id).is_none() {
                    return Err(ExamError::validation(
                        "Selected option does not belong to this question",
                    ));
                }
            }
        }
        QuestionKind::FreeText => {
            if payload.selected_option_id.is_some() {
                return Err(ExamError::validation("Free-text questions take answer text"));
            }
        }
    }
    Ok(())
}

/// Upserts the answer for `question_id` while the attempt is open.
///
/// An attempt whose budget ran out is closed here and the answer is
/// rejected, even when the request raced the deadline.
pub(crate) async fn save(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
    question_id: &str,
    payload: AnswerPayload,
) -> ExamResult<SavedAnswer> {
    let exam = attempt_lifecycle::load_exam(state, exam_id).await?;
    let attempt = attempt_lifecycle::load_attempt(state, exam_id, student_id).await?;
    if attempt.status.is_terminal() {
        return Err(ExamError::AttemptClosed);
    }

    let now = state.clock().now();
    if attempt_lifecycle::is_expired(&attempt, &exam, now) {
        let closed = attempt_lifecycle::auto_submit(state, &attempt, now).await?;
        tracing::info!(
            attempt_id = %closed.id,
            exam_id,
            student_id,
            question_id,
            status = closed.status.as_str(),
            "Answer rejected; attempt time expired"
        );
        return Err(ExamError::AttemptExpired);
    }

    let questions = state.store().list_questions(&exam.paper_id).await?;
    let question = questions
        .iter()
        .find(|entry| entry.question.id == question_id)
        .ok_or_else(|| ExamError::validation("Question does not belong to this exam"))?;
    validate_payload(question, &payload)?;

    let write = AnswerWrite {
        id: Uuid::new_v4().to_string(),
        attempt_id: attempt.id.clone(),
        question_id: question_id.to_string(),
        selected_option_id: payload.selected_option_id,
        answer_text: payload.answer_text,
        now,
    };

    match state.store().save_answer(&write).await? {
        Guarded::Applied(answer) => {
            metrics::counter!(ANSWERS_SAVED).increment(1);
            tracing::debug!(attempt_id = %attempt.id, question_id, "Answer saved");
            Ok(SavedAnswer { answer, remaining_minutes: remaining_minutes(&attempt, &exam, now) })
        }
        Guarded::Refused(Refusal::AttemptClosed(_)) => Err(ExamError::AttemptClosed),
        Guarded::Refused(other) => {
            Err(ExamError::invalid_state(format!("Answer not saved: {other:?}")))
        }
        Guarded::Missing => Err(ExamError::not_found("No attempt for this exam")),
    }
}
