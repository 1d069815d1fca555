use crate::db::models::Answer;
use crate::store::AnswerWrite;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, selected_option_id, answer_text, marks_awarded, \
    created_at, updated_at";

/// Last write wins per (attempt, question); marks are left to grading.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    write: &AnswerWrite,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO exam_answers (
            id, attempt_id, question_id, selected_option_id, answer_text,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$6)
        ON CONFLICT (attempt_id, question_id) DO UPDATE
        SET selected_option_id = EXCLUDED.selected_option_id,
            answer_text = EXCLUDED.answer_text,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}"
    ))
    .bind(&write.id)
    .bind(&write.attempt_id)
    .bind(&write.question_id)
    .bind(&write.selected_option_id)
    .bind(&write.answer_text)
    .bind(write.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM exam_answers WHERE attempt_id = $1 ORDER BY created_at, id"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn set_marks(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    marks_awarded: Option<f64>,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exam_answers SET marks_awarded = $1, updated_at = $2 WHERE id = $3")
        .bind(marks_awarded)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}
