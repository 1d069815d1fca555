use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use super::{AnswerWrite, ExamStore, Guarded, Refusal, StoreError, StoreResult};
use crate::db::models::{Answer, Attempt, Exam, ExpiryCandidate, PaperQuestion, QuestionPaper};
use crate::db::types::{AttemptStatus, ExamStatus};
use crate::repositories;
use crate::services::grading::GradingEngine;

#[derive(Clone)]
pub(crate) struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transition_exam(
        &self,
        exam_id: &str,
        from: ExamStatus,
        to: ExamStatus,
        now: PrimitiveDateTime,
    ) -> StoreResult<Guarded<Exam>> {
        let mut tx = self.pool.begin().await?;
        let Some(exam) = repositories::exams::lock_by_id(&mut *tx, exam_id).await? else {
            return Ok(Guarded::Missing);
        };
        if exam.status != from {
            return Ok(Guarded::Refused(Refusal::ExamNotInStatus(exam.status)));
        }
        if to == ExamStatus::Published {
            // Question inserts lock the paper row too, so the count is stable.
            repositories::papers::lock_by_id(&mut *tx, &exam.paper_id).await?;
            if repositories::papers::count_questions(&mut *tx, &exam.paper_id).await? == 0 {
                return Ok(Guarded::Refused(Refusal::EmptyPaper));
            }
        }

        let updated =
            repositories::exams::transition_status(&mut *tx, exam_id, from, to, now).await?;
        tx.commit().await?;
        Ok(match updated {
            Some(exam) => Guarded::Applied(exam),
            None => Guarded::Missing,
        })
    }
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(repositories::health::ping(&self.pool).await?)
    }

    async fn is_member(&self, batch_id: &str, student_id: &str) -> StoreResult<bool> {
        Ok(repositories::batches::is_member(&self.pool, batch_id, student_id).await?)
    }

    async fn add_batch_member(
        &self,
        batch_id: &str,
        student_id: &str,
        now: PrimitiveDateTime,
    ) -> StoreResult<bool> {
        Ok(repositories::batches::add_member(&self.pool, batch_id, student_id, now).await?)
    }

    async fn remove_batch_member(&self, batch_id: &str, student_id: &str) -> StoreResult<bool> {
        Ok(repositories::batches::remove_member(&self.pool, batch_id, student_id).await?)
    }

    async fn count_batch_members(&self, batch_id: &str) -> StoreResult<i64> {
        Ok(repositories::batches::count_members(&self.pool, batch_id).await?)
    }

    async fn insert_paper(&self, paper: &QuestionPaper) -> StoreResult<()> {
        Ok(repositories::papers::create(&self.pool, paper).await?)
    }

    async fn find_paper(&self, paper_id: &str) -> StoreResult<Option<QuestionPaper>> {
        Ok(repositories::papers::find_by_id(&self.pool, paper_id).await?)
    }

    async fn list_questions(&self, paper_id: &str) -> StoreResult<Vec<PaperQuestion>> {
        let mut conn = self.pool.acquire().await?;
        Ok(repositories::papers::list_questions(&mut conn, paper_id).await?)
    }

    async fn insert_question(
        &self,
        question: &PaperQuestion,
    ) -> StoreResult<Guarded<PaperQuestion>> {
        let paper_id = question.question.paper_id.as_str();
        let mut tx = self.pool.begin().await?;
        if !repositories::papers::lock_by_id(&mut *tx, paper_id).await? {
            return Ok(Guarded::Missing);
        }
        if repositories::exams::paper_is_locked(&mut *tx, paper_id).await? {
            return Ok(Guarded::Refused(Refusal::PaperLocked));
        }
        let mut stored = question.clone();
        stored.question.position = repositories::papers::next_position(&mut *tx, paper_id).await?;
        repositories::papers::insert_question(&mut tx, &stored).await?;
        tx.commit().await?;
        Ok(Guarded::Applied(stored))
    }

    async fn delete_question(
        &self,
        paper_id: &str,
        question_id: &str,
    ) -> StoreResult<Guarded<()>> {
        let mut tx = self.pool.begin().await?;
        if !repositories::papers::lock_by_id(&mut *tx, paper_id).await? {
            return Ok(Guarded::Missing);
        }
        if repositories::exams::paper_is_locked(&mut *tx, paper_id).await? {
            return Ok(Guarded::Refused(Refusal::PaperLocked));
        }
        if !repositories::papers::delete_question(&mut *tx, paper_id, question_id).await? {
            return Ok(Guarded::Missing);
        }
        tx.commit().await?;
        Ok(Guarded::Applied(()))
    }

    async fn insert_exam(&self, exam: &Exam) -> StoreResult<()> {
        Ok(repositories::exams::create(&self.pool, exam).await?)
    }

    async fn find_exam(&self, exam_id: &str) -> StoreResult<Option<Exam>> {
        Ok(repositories::exams::find_by_id(&self.pool, exam_id).await?)
    }

    async fn list_published_exams_for_student(&self, student_id: &str) -> StoreResult<Vec<Exam>> {
        Ok(repositories::exams::list_published_for_student(&self.pool, student_id).await?)
    }

    async fn publish_exam(
        &self,
        exam_id: &str,
        now: PrimitiveDateTime,
    ) -> StoreResult<Guarded<Exam>> {
        self.transition_exam(exam_id, ExamStatus::Draft, ExamStatus::Published, now).await
    }

    async fn complete_exam(
        &self,
        exam_id: &str,
        now: PrimitiveDateTime,
    ) -> StoreResult<Guarded<Exam>> {
        self.transition_exam(exam_id, ExamStatus::Published, ExamStatus::Completed, now).await
    }

    async fn delete_exam(&self, exam_id: &str) -> StoreResult<Guarded<()>> {
        let mut tx = self.pool.begin().await?;
        if repositories::exams::lock_by_id(&mut *tx, exam_id).await?.is_none() {
            return Ok(Guarded::Missing);
        }
        // The FK from exam_attempts blocks a racing insert until we commit.
        let attempts = repositories::attempts::count_for_exam(&mut *tx, exam_id).await?;
        if attempts > 0 {
            return Ok(Guarded::Refused(Refusal::HasAttempts(attempts)));
        }
        repositories::exams::delete_by_id(&mut *tx, exam_id).await?;
        tx.commit().await?;
        Ok(Guarded::Applied(()))
    }

    async fn has_attempt(&self, exam_id: &str, student_id: &str) -> StoreResult<bool> {
        Ok(repositories::attempts::exists(&self.pool, exam_id, student_id).await?)
    }

    async fn create_attempt(&self, attempt: &Attempt) -> StoreResult<bool> {
        Ok(repositories::attempts::create(&self.pool, attempt).await?)
    }

    async fn find_attempt(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> StoreResult<Option<Attempt>> {
        let mut rows =
            repositories::attempts::list_for_pair(&self.pool, exam_id, student_id).await?;
        if rows.len() > 1 {
            tracing::error!(
                exam_id,
                student_id,
                "Multiple attempts stored for one exam and student"
            );
            return Err(StoreError::Invariant(format!(
                "multiple attempts for exam {exam_id} and student {student_id}"
            )));
        }
        Ok(rows.pop())
    }

    async fn list_answers(&self, attempt_id: &str) -> StoreResult<Vec<Answer>> {
        Ok(repositories::answers::list_by_attempt(&self.pool, attempt_id).await?)
    }

    async fn save_answer(&self, write: &AnswerWrite) -> StoreResult<Guarded<Answer>> {
        let mut tx = self.pool.begin().await?;
        let Some(status) =
            repositories::attempts::lock_status_shared(&mut *tx, &write.attempt_id).await?
        else {
            return Ok(Guarded::Missing);
        };
        if status.is_terminal() {
            return Ok(Guarded::Refused(Refusal::AttemptClosed(status)));
        }
        let answer = repositories::answers::upsert(&mut *tx, write).await?;
        tx.commit().await?;
        Ok(Guarded::Applied(answer))
    }

    async fn finalize_attempt(
        &self,
        attempt_id: &str,
        status: AttemptStatus,
        now: PrimitiveDateTime,
        grading: &GradingEngine,
    ) -> StoreResult<Option<Attempt>> {
        let mut tx = self.pool.begin().await?;
        let Some(mut closed) =
            repositories::attempts::close_if_open(&mut *tx, attempt_id, status, now).await?
        else {
            return Ok(None);
        };

        let exam = repositories::exams::find_by_id(&mut *tx, &closed.exam_id)
            .await?
            .ok_or_else(|| StoreError::Invariant(format!("exam {} missing", closed.exam_id)))?;
        let questions = repositories::papers::list_questions(&mut tx, &exam.paper_id).await?;
        let answers = repositories::answers::list_by_attempt(&mut *tx, attempt_id).await?;

        // Dropping `tx` on error rolls the status change back with it.
        let sheet = grading.grade(&closed, &questions, &answers)?;
        for award in &sheet.awards {
            repositories::answers::set_marks(&mut *tx, &award.answer_id, award.marks_awarded, now)
                .await?;
        }
        repositories::attempts::set_score(&mut *tx, attempt_id, sheet.score).await?;
        tx.commit().await?;

        closed.score = Some(sheet.score);
        Ok(Some(closed))
    }

    async fn list_expiry_candidates(
        &self,
        now: PrimitiveDateTime,
    ) -> StoreResult<Vec<ExpiryCandidate>> {
        Ok(repositories::attempts::list_expired(&self.pool, now).await?)
    }

    async fn list_closed_attempts_for_exam(&self, exam_id: &str) -> StoreResult<Vec<Attempt>> {
        Ok(repositories::attempts::list_closed_for_exam(&self.pool, exam_id).await?)
    }

    async fn list_closed_attempts_for_student(
        &self,
        student_id: &str,
    ) -> StoreResult<Vec<Attempt>> {
        Ok(repositories::attempts::list_closed_for_student(&self.pool, student_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::PgExamStore;
    use crate::db::models::Attempt;
    use crate::db::types::{AttemptStatus, ExamStatus};
    use crate::services::grading::GradingEngine;
    use crate::store::{AnswerWrite, ExamStore, Guarded, Refusal};
    use crate::test_support::fixtures;

    async fn store() -> anyhow::Result<Option<PgExamStore>> {
        dotenvy::dotenv().ok();
        let Some(database_url) =
            std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
        else {
            eprintln!("DATABASE_URL is not set; skipping Postgres store test");
            return Ok(None);
        };

        let pool =
            sqlx::postgres::PgPoolOptions::new().max_connections(8).connect(&database_url).await?;
        crate::db::run_migrations(&pool).await?;
        Ok(Some(PgExamStore::new(pool)))
    }

    /// Seeds a fresh paper and a published exam on it.
    async fn seed_exam(store: &PgExamStore, suffix: &str) -> anyhow::Result<(String, String)> {
        let paper_id = format!("paper-{suffix}");
        let exam_id = format!("exam-{suffix}");
        fixtures::seed_paper(store, &paper_id).await;
        store
            .insert_exam(&fixtures::exam(&exam_id, "batch-pg", &paper_id, ExamStatus::Published))
            .await?;
        Ok((paper_id, exam_id))
    }

    fn suffix() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    #[tokio::test]
    async fn concurrent_starts_create_one_attempt() -> anyhow::Result<()> {
        let Some(store) = store().await? else {
            return Ok(());
        };
        let suffix = suffix();
        let (_, exam_id) = seed_exam(&store, &suffix).await?;

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            let attempt = fixtures::attempt(&format!("att-{suffix}-{n}"), &exam_id, "student-pg");
            handles.push(tokio::spawn(async move { store.create_attempt(&attempt).await }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await?? {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert!(store.find_attempt(&exam_id, "student-pg").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn attempt_closes_once_and_refuses_later_answers() -> anyhow::Result<()> {
        let Some(store) = store().await? else {
            return Ok(());
        };
        let suffix = suffix();
        let (paper_id, exam_id) = seed_exam(&store, &suffix).await?;
        let attempt_id = format!("att-{suffix}");
        assert!(
            store.create_attempt(&fixtures::attempt(&attempt_id, &exam_id, "student-pg")).await?
        );

        let question_id = fixtures::question_id(&paper_id, 1);
        let write = |id: &str| AnswerWrite {
            id: id.to_string(),
            attempt_id: attempt_id.clone(),
            question_id: question_id.clone(),
            selected_option_id: Some(fixtures::option_id(&question_id, "B")),
            answer_text: None,
            now: fixtures::t0() + Duration::minutes(5),
        };
        let saved = store.save_answer(&write(&format!("ans-{suffix}-1"))).await?;
        assert!(matches!(saved, Guarded::Applied(_)));

        let grading = GradingEngine::new(40);
        let now = fixtures::t0() + Duration::minutes(10);
        let closed = store
            .finalize_attempt(&attempt_id, AttemptStatus::Submitted, now, &grading)
            .await?
            .expect("first close applies");
        assert_eq!(closed.status, AttemptStatus::Submitted);
        assert_eq!(closed.score, Some(10.0));

        let again =
            store.finalize_attempt(&attempt_id, AttemptStatus::AutoSubmitted, now, &grading).await?;
        assert!(again.is_none());

        let late = store.save_answer(&write(&format!("ans-{suffix}-2"))).await?;
        assert!(matches!(late, Guarded::Refused(Refusal::AttemptClosed(AttemptStatus::Submitted))));

        let answers = store.list_answers(&attempt_id).await?;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].marks_awarded, Some(10.0));
        Ok(())
    }

    #[tokio::test]
    async fn expiry_candidates_are_open_attempts_past_their_duration() -> anyhow::Result<()> {
        let Some(store) = store().await? else {
            return Ok(());
        };
        let suffix = suffix();
        let (_, exam_id) = seed_exam(&store, &suffix).await?;
        let now = fixtures::t0();

        let started = |student: &str, minutes_ago: i64| Attempt {
            started_at: now - Duration::minutes(minutes_ago),
            ..fixtures::attempt(&format!("att-{suffix}-{student}"), &exam_id, student)
        };
        let spent = started("s1", 61);
        let at_boundary = started("s2", 60);
        let fresh = started("s3", 10);
        let submitted = started("s4", 90);
        for attempt in [&spent, &at_boundary, &fresh, &submitted] {
            assert!(store.create_attempt(attempt).await?);
        }
        store
            .finalize_attempt(
                &submitted.id,
                AttemptStatus::Submitted,
                now - Duration::minutes(40),
                &GradingEngine::new(40),
            )
            .await?
            .expect("submitted");

        let mut ids: Vec<String> = store
            .list_expiry_candidates(now)
            .await?
            .into_iter()
            .filter(|candidate| candidate.attempt.exam_id == exam_id)
            .map(|candidate| {
                assert_eq!(candidate.duration_minutes, 60);
                candidate.attempt.id
            })
            .collect();
        ids.sort();

        assert_eq!(ids, vec![spent.id.clone(), at_boundary.id.clone()]);
        Ok(())
    }
}
