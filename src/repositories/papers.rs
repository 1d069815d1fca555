use std::collections::HashMap;

use sqlx::PgPool;

use crate::db::models::{PaperQuestion, Question, QuestionOption, QuestionPaper};

pub(crate) const COLUMNS: &str = "id, title, subject, created_by, created_at, updated_at";

const QUESTION_COLUMNS: &str = "id, paper_id, kind, prompt, marks, position, created_at";

const OPTION_COLUMNS: &str = "id, question_id, body, is_correct, position";

pub(crate) async fn create(pool: &PgPool, paper: &QuestionPaper) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO question_papers (id, title, subject, created_by, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(&paper.id)
    .bind(&paper.title)
    .bind(&paper.subject)
    .bind(&paper.created_by)
    .bind(paper.created_at)
    .bind(paper.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<QuestionPaper>, sqlx::Error> {
    sqlx::query_as::<_, QuestionPaper>(&format!(
        "SELECT {COLUMNS} FROM question_papers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Row lock that serialises structural edits against publishing.
pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT id FROM question_papers WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
    Ok(found.is_some())
}

pub(crate) async fn count_questions(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE paper_id = $1")
        .bind(paper_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn list_questions(
    conn: &mut sqlx::PgConnection,
    paper_id: &str,
) -> Result<Vec<PaperQuestion>, sqlx::Error> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE paper_id = $1 ORDER BY position, id"
    ))
    .bind(paper_id)
    .fetch_all(&mut *conn)
    .await?;

    let options = sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options
         WHERE question_id IN (SELECT id FROM questions WHERE paper_id = $1)
         ORDER BY position, id"
    ))
    .bind(paper_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<String, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id.clone()).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = grouped.remove(&question.id).unwrap_or_default();
            PaperQuestion { question, options }
        })
        .collect())
}

/// Position after the paper's last question. Callers hold the paper lock.
pub(crate) async fn next_position(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM questions WHERE paper_id = $1",
    )
    .bind(paper_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn insert_question(
    conn: &mut sqlx::PgConnection,
    entry: &PaperQuestion,
) -> Result<(), sqlx::Error> {
    let question = &entry.question;
    sqlx::query(
        "INSERT INTO questions (id, paper_id, kind, prompt, marks, position, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(&question.id)
    .bind(&question.paper_id)
    .bind(question.kind)
    .bind(&question.prompt)
    .bind(question.marks)
    .bind(question.position)
    .bind(question.created_at)
    .execute(&mut *conn)
    .await?;

    for option in &entry.options {
        sqlx::query(
            "INSERT INTO question_options (id, question_id, body, is_correct, position)
             VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(&option.id)
        .bind(&option.question_id)
        .bind(&option.body)
        .bind(option.is_correct)
        .bind(option.position)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub(crate) async fn delete_question(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1 AND paper_id = $2")
        .bind(question_id)
        .bind(paper_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
