//! Attempt state machine.
//!
//! `InProgress -> {Submitted, AutoSubmitted}`; both targets are terminal.
//! [`next_status`] is the only place the transition table lives, and the
//! store applies it as a compare-and-swap so concurrent closes resolve to a
//! single winner.

use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::metrics::{ATTEMPTS_CLOSED, ATTEMPTS_STARTED};
use crate::core::state::AppState;
use crate::core::time::whole_minutes_between;
use crate::db::models::{Attempt, Exam};
use crate::db::types::AttemptStatus;
use crate::services::access_policy;
use crate::services::errors::{ExamError, ExamResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeMode {
    ManualSubmit,
    AutoDeadline,
}

impl FinalizeMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ManualSubmit => "manual",
            Self::AutoDeadline => "auto",
        }
    }
}

/// Status reached by closing an attempt in `current` with `mode`, or `None`
/// when `current` is already terminal.
pub(crate) fn next_status(current: AttemptStatus, mode: FinalizeMode) -> Option<AttemptStatus> {
    match (current, mode) {
        (AttemptStatus::InProgress, FinalizeMode::ManualSubmit) => Some(AttemptStatus::Submitted),
        (AttemptStatus::InProgress, FinalizeMode::AutoDeadline) => {
            Some(AttemptStatus::AutoSubmitted)
        }
        (AttemptStatus::Submitted | AttemptStatus::AutoSubmitted, _) => None,
    }
}

/// Whole minutes left on the attempt's budget; 0 once closed.
pub(crate) fn remaining_minutes(attempt: &Attempt, exam: &Exam, now: PrimitiveDateTime) -> i64 {
    remaining_within_budget(attempt, exam.duration_minutes, now)
}

pub(crate) fn remaining_within_budget(
    attempt: &Attempt,
    duration_minutes: i32,
    now: PrimitiveDateTime,
) -> i64 {
    if attempt.status != AttemptStatus::InProgress {
        return 0;
    }
    // A clock behind `started_at` counts as no time spent.
    let elapsed = whole_minutes_between(attempt.started_at, now).max(0);
    (i64::from(duration_minutes) - elapsed).max(0)
}

pub(crate) fn is_expired(attempt: &Attempt, exam: &Exam, now: PrimitiveDateTime) -> bool {
    attempt.status == AttemptStatus::InProgress && remaining_minutes(attempt, exam, now) == 0
}

#[derive(Debug, Clone)]
pub(crate) struct AttemptView {
    pub(crate) attempt: Attempt,
    pub(crate) remaining_minutes: i64,
}

impl AttemptView {
    fn at(attempt: Attempt, exam: &Exam, now: PrimitiveDateTime) -> Self {
        let remaining_minutes = remaining_minutes(&attempt, exam, now);
        Self { attempt, remaining_minutes }
    }
}

/// Result of a close request.
#[derive(Debug, Clone)]
pub(crate) enum Finalized {
    /// This call performed the transition.
    Closed(Attempt),
    /// Some earlier call did; carries the stored attempt.
    AlreadyClosed(Attempt),
}

pub(crate) async fn load_exam(state: &AppState, exam_id: &str) -> ExamResult<Exam> {
    state
        .store()
        .find_exam(exam_id)
        .await?
        .ok_or_else(|| ExamError::not_found("Exam not found"))
}

pub(crate) async fn load_attempt(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> ExamResult<Attempt> {
    state
        .store()
        .find_attempt(exam_id, student_id)
        .await?
        .ok_or_else(|| ExamError::not_found("No attempt for this exam"))
}

pub(crate) async fn start(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> ExamResult<AttemptView> {
    let exam = load_exam(state, exam_id).await?;
    let now = state.clock().now();

    access_policy::ensure_can_enter(state.store(), &exam, student_id, now).await?;
    if access_policy::has_attempt(state.store(), &exam.id, student_id).await? {
        return Err(ExamError::DuplicateAttempt);
    }

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        exam_id: exam.id.clone(),
        student_id: student_id.to_string(),
        started_at: now,
        submitted_at: None,
        score: None,
        status: AttemptStatus::InProgress,
        created_at: now,
        updated_at: now,
    };
    // The existence check above is advisory; the store's create-if-absent
    // decides the race.
    if !state.store().create_attempt(&attempt).await? {
        tracing::info!(exam_id = %exam.id, student_id, "Concurrent start lost the race");
        return Err(ExamError::DuplicateAttempt);
    }

    metrics::counter!(ATTEMPTS_STARTED).increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        exam_id = %exam.id,
        student_id,
        duration_minutes = exam.duration_minutes,
        "Exam attempt started"
    );

    Ok(AttemptView::at(attempt, &exam, now))
}

/// Single entry point for both close paths.
pub(crate) async fn finalize(
    state: &AppState,
    attempt: &Attempt,
    mode: FinalizeMode,
    now: PrimitiveDateTime,
) -> ExamResult<Finalized> {
    let Some(target) = next_status(attempt.status, mode) else {
        return Ok(Finalized::AlreadyClosed(attempt.clone()));
    };

    match state.store().finalize_attempt(&attempt.id, target, now, state.grading()).await? {
        Some(closed) => {
            metrics::counter!(ATTEMPTS_CLOSED, "mode" => mode.as_str()).increment(1);
            tracing::info!(
                attempt_id = %closed.id,
                exam_id = %closed.exam_id,
                student_id = %closed.student_id,
                mode = mode.as_str(),
                score = closed.score.unwrap_or_default(),
                "Exam attempt closed"
            );
            Ok(Finalized::Closed(closed))
        }
        None => {
            let stored = load_attempt(state, &attempt.exam_id, &attempt.student_id).await?;
            tracing::debug!(
                attempt_id = %stored.id,
                mode = mode.as_str(),
                status = stored.status.as_str(),
                "Close skipped; attempt was closed concurrently"
            );
            Ok(Finalized::AlreadyClosed(stored))
        }
    }
}

/// Idempotent: closing an already closed attempt returns it unchanged.
pub(crate) async fn auto_submit(
    state: &AppState,
    attempt: &Attempt,
    now: PrimitiveDateTime,
) -> ExamResult<Attempt> {
    match finalize(state, attempt, FinalizeMode::AutoDeadline, now).await? {
        Finalized::Closed(attempt) | Finalized::AlreadyClosed(attempt) => Ok(attempt),
    }
}

/// Explicit submit. A spent budget is closed through the deadline path so
/// the stored status reflects the expiry.
pub(crate) async fn submit(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> ExamResult<AttemptView> {
    let exam = load_exam(state, exam_id).await?;
    let attempt = load_attempt(state, exam_id, student_id).await?;
    let now = state.clock().now();

    if attempt.status.is_terminal() {
        return Err(ExamError::AlreadyClosed);
    }

    let mode = if is_expired(&attempt, &exam, now) {
        FinalizeMode::AutoDeadline
    } else {
        FinalizeMode::ManualSubmit
    };

    match finalize(state, &attempt, mode, now).await? {
        Finalized::Closed(closed) => Ok(AttemptView::at(closed, &exam, now)),
        Finalized::AlreadyClosed(_) => Err(ExamError::AlreadyClosed),
    }
}

/// The student's attempt with lazy expiry applied.
pub(crate) async fn current_attempt(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> ExamResult<AttemptView> {
    let exam = load_exam(state, exam_id).await?;
    let mut attempt = load_attempt(state, exam_id, student_id).await?;
    let now = state.clock().now();

    if is_expired(&attempt, &exam, now) {
        attempt = auto_submit(state, &attempt, now).await?;
    }

    Ok(AttemptView::at(attempt, &exam, now))
}

/// Re-runs grading over stored answers without writing anything.
pub(crate) async fn recompute_score(state: &AppState, attempt: &Attempt) -> ExamResult<f64> {
    if !attempt.status.is_terminal() {
        return Err(ExamError::invalid_state("Attempt is still in progress"));
    }
    let exam = load_exam(state, &attempt.exam_id).await?;
    let questions = state.store().list_questions(&exam.paper_id).await?;
    let answers = state.store().list_answers(&attempt.id).await?;
    let sheet = state
        .grading()
        .grade(attempt, &questions, &answers)
        .map_err(|err| ExamError::invalid_state(err.to_string()))?;
    Ok(sheet.score)
}
