use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::config::ExamSettings;
use crate::core::state::AppState;
use crate::db::models::{Exam, PaperQuestion, Question, QuestionOption, QuestionPaper};
use crate::db::types::{ExamStatus, QuestionKind};
use crate::services::errors::{ExamError, ExamResult};
use crate::services::grading::total_marks;
use crate::store::{Guarded, Refusal};

#[derive(Debug, Clone)]
pub(crate) struct NewOption {
    pub(crate) body: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct NewQuestion {
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) marks: i32,
    pub(crate) options: Vec<NewOption>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewExam {
    pub(crate) batch_id: String,
    pub(crate) paper_id: String,
    pub(crate) title: String,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct PaperDetail {
    pub(crate) paper: QuestionPaper,
    pub(crate) questions: Vec<PaperQuestion>,
    pub(crate) total_marks: i64,
}

pub(crate) fn validate_question(rules: &ExamSettings, question: &NewQuestion) -> ExamResult<()> {
    if question.prompt.trim().is_empty() {
        return Err(ExamError::validation("Question prompt must not be empty"));
    }
    if question.marks < 1 {
        return Err(ExamError::validation("Question marks must be a positive integer"));
    }

    match question.kind {
        QuestionKind::FreeText => {
            if !question.options.is_empty() {
                return Err(ExamError::validation("Free-text questions cannot have options"));
            }
        }
        QuestionKind::Objective => {
            let count = question.options.len();
            if count < rules.min_options_per_question || count > rules.max_options_per_question {
                return Err(ExamError::validation(format!(
                    "Objective questions need between {} and {} options",
                    rules.min_options_per_question, rules.max_options_per_question
                )));
            }
            if question.options.iter().any(|option| option.body.trim().is_empty()) {
                return Err(ExamError::validation("Option text must not be empty"));
            }
            let correct = question.options.iter().filter(|option| option.is_correct).count();
            if correct != 1 {
                return Err(ExamError::validation(
                    "Objective questions need exactly one correct option",
                ));
            }
        }
    }
    Ok(())
}

fn refusal_error(refusal: Refusal) -> ExamError {
    match refusal {
        Refusal::PaperLocked => {
            ExamError::invalid_state("Question paper is locked by a published exam")
        }
        Refusal::ExamNotInStatus(status) => {
            ExamError::invalid_state(format!("Exam is {status:?} and cannot make this transition"))
        }
        Refusal::EmptyPaper => {
            ExamError::invalid_state("Exam cannot be published without questions")
        }
        Refusal::HasAttempts(count) => ExamError::invalid_state(format!(
            "Exam has {count} attempt(s) and cannot be deleted"
        )),
        Refusal::AttemptClosed(_) => ExamError::AttemptClosed,
    }
}

fn applied<T>(outcome: Guarded<T>, missing: &str) -> ExamResult<T> {
    match outcome {
        Guarded::Applied(value) => Ok(value),
        Guarded::Refused(refusal) => Err(refusal_error(refusal)),
        Guarded::Missing => Err(ExamError::not_found(missing)),
    }
}

pub(crate) async fn create_paper(
    state: &AppState,
    title: &str,
    subject: Option<String>,
    created_by: &str,
) -> ExamResult<QuestionPaper> {
    if title.trim().is_empty() {
        return Err(ExamError::validation("Paper title must not be empty"));
    }
    let now = state.clock().now();
    let paper = QuestionPaper {
        id: Uuid::new_v4().to_string(),
        title: title.trim().to_string(),
        subject,
        created_by: Some(created_by.to_string()),
        created_at: now,
        updated_at: now,
    };
    state.store().insert_paper(&paper).await?;
    tracing::info!(paper_id = %paper.id, created_by, "Question paper created");
    Ok(paper)
}

pub(crate) async fn paper_detail(state: &AppState, paper_id: &str) -> ExamResult<PaperDetail> {
    let paper = state
        .store()
        .find_paper(paper_id)
        .await?
        .ok_or_else(|| ExamError::not_found("Question paper not found"))?;
    let questions = state.store().list_questions(paper_id).await?;
    Ok(PaperDetail { total_marks: total_marks(&questions), paper, questions })
}

pub(crate) async fn add_question(
    state: &AppState,
    paper_id: &str,
    input: NewQuestion,
) -> ExamResult<PaperQuestion> {
    validate_question(state.settings().exam(), &input)?;

    let now = state.clock().now();
    let question_id = Uuid::new_v4().to_string();
    let entry = PaperQuestion {
        question: Question {
            id: question_id.clone(),
            paper_id: paper_id.to_string(),
            kind: input.kind,
            prompt: input.prompt.trim().to_string(),
            marks: input.marks,
            // Assigned by the store under the paper lock.
            position: 0,
            created_at: now,
        },
        options: input
            .options
            .into_iter()
            .enumerate()
            .map(|(index, option)| QuestionOption {
                id: Uuid::new_v4().to_string(),
                question_id: question_id.clone(),
                body: option.body.trim().to_string(),
                is_correct: option.is_correct,
                position: index as i32 + 1,
            })
            .collect(),
    };

    let stored =
        applied(state.store().insert_question(&entry).await?, "Question paper not found")?;
    tracing::info!(
        paper_id,
        question_id = %stored.question.id,
        position = stored.question.position,
        "Question added"
    );
    Ok(stored)
}

pub(crate) async fn remove_question(
    state: &AppState,
    paper_id: &str,
    question_id: &str,
) -> ExamResult<()> {
    applied(state.store().delete_question(paper_id, question_id).await?, "Question not found")?;
    tracing::info!(paper_id, question_id, "Question removed");
    Ok(())
}

pub(crate) async fn create_exam(state: &AppState, input: NewExam) -> ExamResult<Exam> {
    if input.title.trim().is_empty() {
        return Err(ExamError::validation("Exam title must not be empty"));
    }
    if input.end_time <= input.start_time {
        return Err(ExamError::validation("Exam end time must be after its start time"));
    }
    if input.duration_minutes < 1 {
        return Err(ExamError::validation("Exam duration must be at least one minute"));
    }
    if state.store().find_paper(&input.paper_id).await?.is_none() {
        return Err(ExamError::validation("Question paper does not exist"));
    }

    let now = state.clock().now();
    let exam = Exam {
        id: Uuid::new_v4().to_string(),
        batch_id: input.batch_id,
        paper_id: input.paper_id,
        title: input.title.trim().to_string(),
        start_time: input.start_time,
        end_time: input.end_time,
        duration_minutes: input.duration_minutes,
        status: ExamStatus::Draft,
        created_at: now,
        updated_at: now,
        published_at: None,
    };
    state.store().insert_exam(&exam).await?;
    tracing::info!(exam_id = %exam.id, batch_id = %exam.batch_id, "Exam created");
    Ok(exam)
}

pub(crate) async fn publish_exam(state: &AppState, exam_id: &str) -> ExamResult<Exam> {
    let exam =
        applied(state.store().publish_exam(exam_id, state.clock().now()).await?, "Exam not found")?;
    tracing::info!(exam_id, paper_id = %exam.paper_id, "Exam published");
    Ok(exam)
}

pub(crate) async fn complete_exam(state: &AppState, exam_id: &str) -> ExamResult<Exam> {
    let exam = applied(
        state.store().complete_exam(exam_id, state.clock().now()).await?,
        "Exam not found",
    )?;
    tracing::info!(exam_id, "Exam completed");
    Ok(exam)
}

pub(crate) async fn delete_exam(state: &AppState, exam_id: &str) -> ExamResult<()> {
    applied(state.store().delete_exam(exam_id).await?, "Exam not found")?;
    tracing::info!(exam_id, "Exam deleted");
    Ok(())
}

pub(crate) async fn add_member(
    state: &AppState,
    batch_id: &str,
    student_id: &str,
) -> ExamResult<bool> {
    Ok(state.store().add_batch_member(batch_id, student_id, state.clock().now()).await?)
}

pub(crate) async fn remove_member(
    state: &AppState,
    batch_id: &str,
    student_id: &str,
) -> ExamResult<bool> {
    Ok(state.store().remove_batch_member(batch_id, student_id).await?)
}
