use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamStatus;

pub(crate) const COLUMNS: &str = "\
    id, batch_id, paper_id, title, start_time, end_time, duration_minutes, \
    status, created_at, updated_at, published_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn create(pool: &PgPool, exam: &Exam) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exams (
            id, batch_id, paper_id, title, start_time, end_time, duration_minutes,
            status, created_at, updated_at, published_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
    )
    .bind(&exam.id)
    .bind(&exam.batch_id)
    .bind(&exam.paper_id)
    .bind(&exam.title)
    .bind(exam.start_time)
    .bind(exam.end_time)
    .bind(exam.duration_minutes)
    .bind(exam.status)
    .bind(exam.created_at)
    .bind(exam.updated_at)
    .bind(exam.published_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_published_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams
         WHERE status = $1
           AND batch_id IN (SELECT batch_id FROM batch_students WHERE student_id = $2)
         ORDER BY start_time, id"
    ))
    .bind(ExamStatus::Published)
    .bind(student_id)
    .fetch_all(pool)
    .await
}

/// Moves `from` -> `to` and returns the updated row, or `None` when the
/// exam was not in `from`.
pub(crate) async fn transition_status(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    from: ExamStatus,
    to: ExamStatus,
    now: PrimitiveDateTime,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams
         SET status = $1,
             updated_at = $2,
             published_at = CASE WHEN $1 = 'published'::examstatus THEN $2 ELSE published_at END
         WHERE id = $3 AND status = $4
         RETURNING {COLUMNS}"
    ))
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn paper_is_locked(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM exams WHERE paper_id = $1 AND status <> $2)")
        .bind(paper_id)
        .bind(ExamStatus::Draft)
        .fetch_one(executor)
        .await
}

pub(crate) async fn delete_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(executor).await?;
    Ok(())
}
