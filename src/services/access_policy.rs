use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamStatus;
use crate::services::errors::{ExamError, ExamResult};
use crate::store::{ExamStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admitted,
    NotMember,
    NotPublished,
    NotStarted,
    Ended,
}

impl Admission {
    fn denial_message(self) -> &'static str {
        match self {
            Self::Admitted => "",
            Self::NotMember => "You are not enrolled in this exam's batch",
            Self::NotPublished => "Exam is not open for attempts",
            Self::NotStarted => "Exam has not started yet",
            Self::Ended => "Exam window has closed",
        }
    }
}

/// Inclusive on both ends.
pub(crate) fn within_window(exam: &Exam, now: PrimitiveDateTime) -> bool {
    exam.start_time <= now && now <= exam.end_time
}

/// Evaluates every entry rule; anything short of full admission fails closed.
pub(crate) async fn admission(
    store: &dyn ExamStore,
    exam: &Exam,
    student_id: &str,
    now: PrimitiveDateTime,
) -> StoreResult<Admission> {
    if !store.is_member(&exam.batch_id, student_id).await? {
        return Ok(Admission::NotMember);
    }
    if exam.status != ExamStatus::Published {
        return Ok(Admission::NotPublished);
    }
    if within_window(exam, now) {
        Ok(Admission::Admitted)
    } else if now < exam.start_time {
        Ok(Admission::NotStarted)
    } else {
        Ok(Admission::Ended)
    }
}

pub(crate) async fn can_enter(
    store: &dyn ExamStore,
    exam: &Exam,
    student_id: &str,
    now: PrimitiveDateTime,
) -> StoreResult<bool> {
    Ok(admission(store, exam, student_id, now).await? == Admission::Admitted)
}

pub(crate) async fn ensure_can_enter(
    store: &dyn ExamStore,
    exam: &Exam,
    student_id: &str,
    now: PrimitiveDateTime,
) -> ExamResult<()> {
    match admission(store, exam, student_id, now).await? {
        Admission::Admitted => Ok(()),
        denied => {
            tracing::debug!(
                exam_id = %exam.id,
                student_id,
                reason = ?denied,
                "Exam entry denied"
            );
            Err(ExamError::access_denied(denied.denial_message()))
        }
    }
}

pub(crate) async fn has_attempt(
    store: &dyn ExamStore,
    exam_id: &str,
    student_id: &str,
) -> StoreResult<bool> {
    store.has_attempt(exam_id, student_id).await
}
