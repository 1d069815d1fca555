//! Persistence seam for the attempt lifecycle.
//!
//! Every method is one atomic unit. Implementations must enforce the
//! one-attempt-per-(exam, student) rule and the single terminal transition
//! per attempt themselves; callers never rely on check-then-act.

pub(crate) mod memory;
pub(crate) mod postgres;

use async_trait::async_trait;
use time::PrimitiveDateTime;

use crate::db::models::{Answer, Attempt, Exam, ExpiryCandidate, PaperQuestion, QuestionPaper};
use crate::db::types::{AttemptStatus, ExamStatus};
use crate::services::grading::{GradingEngine, GradingError};

pub(crate) use memory::MemoryStore;
pub(crate) use postgres::PgExamStore;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("persistence invariant violated: {0}")]
    Invariant(String),
}

impl From<GradingError> for StoreError {
    fn from(err: GradingError) -> Self {
        Self::Invariant(err.to_string())
    }
}

pub(crate) type StoreResult<T> = Result<T, StoreError>;

/// Why a guarded write was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refusal {
    PaperLocked,
    ExamNotInStatus(ExamStatus),
    EmptyPaper,
    HasAttempts(i64),
    AttemptClosed(AttemptStatus),
}

/// Outcome of a write that is only applied while a precondition holds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Guarded<T> {
    Applied(T),
    Refused(Refusal),
    Missing,
}

/// Payload for an answer upsert keyed by (attempt, question).
#[derive(Debug, Clone)]
pub(crate) struct AnswerWrite {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) answer_text: Option<String>,
    pub(crate) now: PrimitiveDateTime,
}

#[async_trait]
pub(crate) trait ExamStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn is_member(&self, batch_id: &str, student_id: &str) -> StoreResult<bool>;
    async fn add_batch_member(
        &self,
        batch_id: &str,
        student_id: &str,
        now: PrimitiveDateTime,
    ) -> StoreResult<bool>;
    async fn remove_batch_member(&self, batch_id: &str, student_id: &str) -> StoreResult<bool>;
    async fn count_batch_members(&self, batch_id: &str) -> StoreResult<i64>;

    async fn insert_paper(&self, paper: &QuestionPaper) -> StoreResult<()>;
    async fn find_paper(&self, paper_id: &str) -> StoreResult<Option<QuestionPaper>>;
    async fn list_questions(&self, paper_id: &str) -> StoreResult<Vec<PaperQuestion>>;
    /// Inserts unless the paper is attached to a non-draft exam. The stored
    /// question is placed after the paper's current last position, assigned
    /// while the paper is held.
    async fn insert_question(&self, question: &PaperQuestion)
        -> StoreResult<Guarded<PaperQuestion>>;
    async fn delete_question(&self, paper_id: &str, question_id: &str)
        -> StoreResult<Guarded<()>>;

    async fn insert_exam(&self, exam: &Exam) -> StoreResult<()>;
    async fn find_exam(&self, exam_id: &str) -> StoreResult<Option<Exam>>;
    /// Published exams of every batch the student currently belongs to.
    async fn list_published_exams_for_student(&self, student_id: &str) -> StoreResult<Vec<Exam>>;
    /// Draft -> Published, only when the paper has at least one question.
    async fn publish_exam(&self, exam_id: &str, now: PrimitiveDateTime)
        -> StoreResult<Guarded<Exam>>;
    /// Published -> Completed.
    async fn complete_exam(
        &self,
        exam_id: &str,
        now: PrimitiveDateTime,
    ) -> StoreResult<Guarded<Exam>>;
    /// Deletes only when no attempt references the exam.
    async fn delete_exam(&self, exam_id: &str) -> StoreResult<Guarded<()>>;

    async fn has_attempt(&self, exam_id: &str, student_id: &str) -> StoreResult<bool>;
    /// Create-if-absent. Returns `false` when an attempt already exists.
    async fn create_attempt(&self, attempt: &Attempt) -> StoreResult<bool>;
    /// Errors with [`StoreError::Invariant`] if more than one attempt exists.
    async fn find_attempt(&self, exam_id: &str, student_id: &str)
        -> StoreResult<Option<Attempt>>;
    async fn list_answers(&self, attempt_id: &str) -> StoreResult<Vec<Answer>>;
    /// Upserts only while the attempt is in progress.
    async fn save_answer(&self, answer: &AnswerWrite) -> StoreResult<Guarded<Answer>>;
    /// Compare-and-swap InProgress -> `status`, grading answers in the same
    /// unit. `None` means another transition won.
    async fn finalize_attempt(
        &self,
        attempt_id: &str,
        status: AttemptStatus,
        now: PrimitiveDateTime,
        grading: &GradingEngine,
    ) -> StoreResult<Option<Attempt>>;
    /// In-progress attempts whose time budget is spent at `now`.
    async fn list_expiry_candidates(&self, now: PrimitiveDateTime)
        -> StoreResult<Vec<ExpiryCandidate>>;
    async fn list_closed_attempts_for_exam(&self, exam_id: &str) -> StoreResult<Vec<Attempt>>;
    async fn list_closed_attempts_for_student(&self, student_id: &str)
        -> StoreResult<Vec<Attempt>>;
}
