use time::PrimitiveDateTime;

use crate::db::models::{Attempt, ExpiryCandidate};
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, started_at, submitted_at, score, status, created_at, updated_at";

/// Insert guarded by `UNIQUE (exam_id, student_id)`. `false` means the
/// student already has an attempt for this exam.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: &Attempt,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO exam_attempts (
            id, exam_id, student_id, started_at, submitted_at, score, status,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        ON CONFLICT (exam_id, student_id) DO NOTHING",
    )
    .bind(&attempt.id)
    .bind(&attempt.exam_id)
    .bind(&attempt.student_id)
    .bind(attempt.started_at)
    .bind(attempt.submitted_at)
    .bind(attempt.score)
    .bind(attempt.status)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn exists(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM exam_attempts WHERE exam_id = $1 AND student_id = $2)",
    )
    .bind(exam_id)
    .bind(student_id)
    .fetch_one(executor)
    .await
}

/// Returns every row for the pair; more than one is a persistence bug the
/// caller must report.
pub(crate) async fn list_for_pair(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    student_id: &str,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts
         WHERE exam_id = $1 AND student_id = $2
         ORDER BY created_at
         LIMIT 2"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_for_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exam_attempts WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(executor)
        .await
}

/// Compare-and-swap out of `in_progress`.
pub(crate) async fn close_if_open(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: AttemptStatus,
    now: PrimitiveDateTime,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "UPDATE exam_attempts
         SET status = $1, submitted_at = $2, updated_at = $2
         WHERE id = $3 AND status = $4
         RETURNING {COLUMNS}"
    ))
    .bind(status)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn set_score(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    score: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exam_attempts SET score = $1 WHERE id = $2")
        .bind(score)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Shared row lock; holds off a concurrent close while an answer is written.
pub(crate) async fn lock_status_shared(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<AttemptStatus>, sqlx::Error> {
    sqlx::query_scalar("SELECT status FROM exam_attempts WHERE id = $1 FOR SHARE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_expired(
    executor: impl sqlx::PgExecutor<'_>,
    now: PrimitiveDateTime,
) -> Result<Vec<ExpiryCandidate>, sqlx::Error> {
    sqlx::query_as::<_, ExpiryCandidate>(
        "SELECT a.id, a.exam_id, a.student_id, a.started_at, a.submitted_at, a.score,
                a.status, a.created_at, a.updated_at, e.duration_minutes
         FROM exam_attempts a
         JOIN exams e ON e.id = a.exam_id
         WHERE a.status = $1
           AND a.started_at + make_interval(mins => e.duration_minutes) <= $2
         ORDER BY a.started_at",
    )
    .bind(AttemptStatus::InProgress)
    .bind(now)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_closed_for_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts
         WHERE exam_id = $1 AND status IN ($2, $3)
         ORDER BY submitted_at DESC"
    ))
    .bind(exam_id)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::AutoSubmitted)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_closed_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts
         WHERE student_id = $1 AND status IN ($2, $3)
         ORDER BY submitted_at DESC"
    ))
    .bind(student_id)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::AutoSubmitted)
    .fetch_all(executor)
    .await
}
