use sqlx::PgPool;
use time::PrimitiveDateTime;

pub(crate) async fn is_member(
    pool: &PgPool,
    batch_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM batch_students WHERE batch_id = $1 AND student_id = $2)",
    )
    .bind(batch_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn add_member(
    pool: &PgPool,
    batch_id: &str,
    student_id: &str,
    joined_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO batch_students (batch_id, student_id, joined_at)
         VALUES ($1, $2, $3)
         ON CONFLICT DO NOTHING",
    )
    .bind(batch_id)
    .bind(student_id)
    .bind(joined_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn remove_member(
    pool: &PgPool,
    batch_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM batch_students WHERE batch_id = $1 AND student_id = $2")
        .bind(batch_id)
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn count_members(pool: &PgPool, batch_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM batch_students WHERE batch_id = $1")
        .bind(batch_id)
        .fetch_one(pool)
        .await
}
