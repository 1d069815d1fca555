use serde::Serialize;

use crate::core::state::AppState;
use crate::db::models::{Exam, PaperQuestion};
use crate::db::types::QuestionKind;
use crate::services::access_policy;
use crate::services::attempt_lifecycle;
use crate::services::errors::ExamResult;
use crate::services::grading::total_marks;

#[derive(Debug, Clone)]
pub(crate) struct ExamListing {
    pub(crate) exam: Exam,
    pub(crate) total_marks: i64,
    pub(crate) is_accessible: bool,
    pub(crate) has_attempted: bool,
}

/// Option as shown to a student: correctness is not part of the type.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StudentOption {
    pub(crate) id: String,
    pub(crate) body: String,
    pub(crate) position: i32,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StudentQuestion {
    pub(crate) id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) marks: i32,
    pub(crate) position: i32,
    pub(crate) options: Vec<StudentOption>,
}

impl From<&PaperQuestion> for StudentQuestion {
    fn from(entry: &PaperQuestion) -> Self {
        Self {
            id: entry.question.id.clone(),
            kind: entry.question.kind,
            prompt: entry.question.prompt.clone(),
            marks: entry.question.marks,
            position: entry.question.position,
            options: entry
                .options
                .iter()
                .map(|option| StudentOption {
                    id: option.id.clone(),
                    body: option.body.clone(),
                    position: option.position,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ExamForAttempt {
    pub(crate) exam: Exam,
    pub(crate) total_marks: i64,
    pub(crate) questions: Vec<StudentQuestion>,
}

/// Published exams of the student's batches, flagged with whether the
/// window is open now and whether an attempt already exists.
pub(crate) async fn list_accessible_exams(
    state: &AppState,
    student_id: &str,
) -> ExamResult<Vec<ExamListing>> {
    let now = state.clock().now();
    let exams = state.store().list_published_exams_for_student(student_id).await?;

    let mut listings = Vec::with_capacity(exams.len());
    for exam in exams {
        let questions = state.store().list_questions(&exam.paper_id).await?;
        let has_attempted = access_policy::has_attempt(state.store(), &exam.id, student_id).await?;
        let is_accessible = access_policy::can_enter(state.store(), &exam, student_id, now).await?;
        listings.push(ExamListing {
            total_marks: total_marks(&questions),
            exam,
            is_accessible,
            has_attempted,
        });
    }
    Ok(listings)
}

pub(crate) async fn view_exam_for_attempt(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> ExamResult<ExamForAttempt> {
    let exam = attempt_lifecycle::load_exam(state, exam_id).await?;
    access_policy::ensure_can_enter(state.store(), &exam, student_id, state.clock().now()).await?;

    let questions = state.store().list_questions(&exam.paper_id).await?;
    Ok(ExamForAttempt {
        total_marks: total_marks(&questions),
        questions: questions.iter().map(StudentQuestion::from).collect(),
        exam,
    })
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::db::types::ExamStatus;
    use crate::store::ExamStore;
    use crate::test_support::{self, fixtures};

    #[tokio::test]
    async fn listing_reports_window_and_attempt_flags() {
        let ctx = test_support::setup_test_context().await;
        fixtures::seed_published_exam(&ctx).await;
        let mut draft = fixtures::exam("exam-draft", "batch-1", "paper-1", ExamStatus::Draft);
        draft.title = "Draft".into();
        ctx.store.insert_exam(&draft).await.expect("draft");

        let before = list_accessible_exams(&ctx.state, "student-1").await.expect("list");
        assert_eq!(before.len(), 1);
        assert!(before[0].is_accessible);
        assert!(!before[0].has_attempted);
        assert_eq!(before[0].total_marks, 30);

        attempt_lifecycle::start(&ctx.state, "exam-1", "student-1").await.expect("start");
        ctx.clock.advance(Duration::hours(2));

        let after = list_accessible_exams(&ctx.state, "student-1").await.expect("list");
        assert!(!after[0].is_accessible);
        assert!(after[0].has_attempted);

        assert!(list_accessible_exams(&ctx.state, "outsider").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn student_view_never_serializes_correctness() {
        let ctx = test_support::setup_test_context().await;
        fixtures::seed_published_exam(&ctx).await;

        let view = view_exam_for_attempt(&ctx.state, "exam-1", "student-1").await.expect("view");
        assert_eq!(view.questions.len(), 3);
        assert_eq!(view.questions[0].options.len(), 4);

        let json = serde_json::to_string(&view.questions).expect("json");
        assert!(!json.contains("is_correct"));
    }

    #[tokio::test]
    async fn view_is_denied_to_non_members() {
        let ctx = test_support::setup_test_context().await;
        fixtures::seed_published_exam(&ctx).await;

        let err = view_exam_for_attempt(&ctx.state, "exam-1", "outsider").await.expect_err("denied");
        assert_eq!(err.kind(), "access_denied");
    }
}
