use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::Mutex;

use super::{AnswerWrite, ExamStore, Guarded, Refusal, StoreError, StoreResult};
use crate::db::models::{Answer, Attempt, Exam, ExpiryCandidate, PaperQuestion, QuestionPaper};
use crate::db::types::{AttemptStatus, ExamStatus};
use crate::services::grading::GradingEngine;

#[derive(Default)]
struct Tables {
    members: HashSet<(String, String)>,
    papers: HashMap<String, QuestionPaper>,
    questions: Vec<PaperQuestion>,
    exams: HashMap<String, Exam>,
    attempts: Vec<Attempt>,
    answers: Vec<Answer>,
}

impl Tables {
    fn paper_locked(&self, paper_id: &str) -> bool {
        self.exams.values().any(|exam| exam.paper_id == paper_id && exam.status.locks_paper())
    }

    fn questions_for(&self, paper_id: &str) -> Vec<PaperQuestion> {
        let mut questions: Vec<PaperQuestion> = self
            .questions
            .iter()
            .filter(|entry| entry.question.paper_id == paper_id)
            .cloned()
            .collect();
        questions.sort_by_key(|entry| entry.question.position);
        questions
    }

    fn attempts_for(&self, exam_id: &str, student_id: &str) -> Vec<&Attempt> {
        self.attempts
            .iter()
            .filter(|attempt| attempt.exam_id == exam_id && attempt.student_id == student_id)
            .collect()
    }

    fn transition_exam(
        &mut self,
        exam_id: &str,
        from: ExamStatus,
        to: ExamStatus,
        now: PrimitiveDateTime,
    ) -> Guarded<Exam> {
        let Some(exam) = self.exams.get_mut(exam_id) else {
            return Guarded::Missing;
        };
        if exam.status != from {
            return Guarded::Refused(Refusal::ExamNotInStatus(exam.status));
        }
        exam.status = to;
        exam.updated_at = now;
        if to == ExamStatus::Published {
            exam.published_at = Some(now);
        }
        Guarded::Applied(exam.clone())
    }
}

/// Process-local store. Every call holds the single table lock for its
/// whole duration, which makes each call one atomic unit.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

fn closed_sorted(mut attempts: Vec<Attempt>) -> Vec<Attempt> {
    attempts.sort_by(|left, right| right.submitted_at.cmp(&left.submitted_at));
    attempts
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn is_member(&self, batch_id: &str, student_id: &str) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.members.contains(&(batch_id.to_string(), student_id.to_string())))
    }

    async fn add_batch_member(
        &self,
        batch_id: &str,
        student_id: &str,
        _now: PrimitiveDateTime,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables.members.insert((batch_id.to_string(), student_id.to_string())))
    }

    async fn remove_batch_member(&self, batch_id: &str, student_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables.members.remove(&(batch_id.to_string(), student_id.to_string())))
    }

    async fn count_batch_members(&self, batch_id: &str) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.members.iter().filter(|(batch, _)| batch == batch_id).count() as i64)
    }

    async fn insert_paper(&self, paper: &QuestionPaper) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.papers.insert(paper.id.clone(), paper.clone());
        Ok(())
    }

    async fn find_paper(&self, paper_id: &str) -> StoreResult<Option<QuestionPaper>> {
        let tables = self.tables.lock().await;
        Ok(tables.papers.get(paper_id).cloned())
    }

    async fn list_questions(&self, paper_id: &str) -> StoreResult<Vec<PaperQuestion>> {
        let tables = self.tables.lock().await;
        Ok(tables.questions_for(paper_id))
    }

    async fn insert_question(
        &self,
        question: &PaperQuestion,
    ) -> StoreResult<Guarded<PaperQuestion>> {
        let mut tables = self.tables.lock().await;
        let paper_id = question.question.paper_id.as_str();
        if !tables.papers.contains_key(paper_id) {
            return Ok(Guarded::Missing);
        }
        if tables.paper_locked(paper_id) {
            return Ok(Guarded::Refused(Refusal::PaperLocked));
        }
        let last = tables
            .questions
            .iter()
            .filter(|entry| entry.question.paper_id == paper_id)
            .map(|entry| entry.question.position)
            .max()
            .unwrap_or(0);
        let mut stored = question.clone();
        stored.question.position = last + 1;
        tables.questions.push(stored.clone());
        Ok(Guarded::Applied(stored))
    }

    async fn delete_question(
        &self,
        paper_id: &str,
        question_id: &str,
    ) -> StoreResult<Guarded<()>> {
        let mut tables = self.tables.lock().await;
        let exists = tables
            .questions
            .iter()
            .any(|entry| entry.question.paper_id == paper_id && entry.question.id == question_id);
        if !exists {
            return Ok(Guarded::Missing);
        }
        if tables.paper_locked(paper_id) {
            return Ok(Guarded::Refused(Refusal::PaperLocked));
        }
        tables.questions.retain(|entry| entry.question.id != question_id);
        Ok(Guarded::Applied(()))
    }

    async fn insert_exam(&self, exam: &Exam) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.exams.insert(exam.id.clone(), exam.clone());
        Ok(())
    }

    async fn find_exam(&self, exam_id: &str) -> StoreResult<Option<Exam>> {
        let tables = self.tables.lock().await;
        Ok(tables.exams.get(exam_id).cloned())
    }

    async fn list_published_exams_for_student(&self, student_id: &str) -> StoreResult<Vec<Exam>> {
        let tables = self.tables.lock().await;
        let mut exams: Vec<Exam> = tables
            .exams
            .values()
            .filter(|exam| exam.status == ExamStatus::Published)
            .filter(|exam| {
                tables.members.contains(&(exam.batch_id.clone(), student_id.to_string()))
            })
            .cloned()
            .collect();
        exams.sort_by(|left, right| {
            left.start_time.cmp(&right.start_time).then_with(|| left.id.cmp(&right.id))
        });
        Ok(exams)
    }

    async fn publish_exam(
        &self,
        exam_id: &str,
        now: PrimitiveDateTime,
    ) -> StoreResult<Guarded<Exam>> {
        let mut tables = self.tables.lock().await;
        let Some(exam) = tables.exams.get(exam_id) else {
            return Ok(Guarded::Missing);
        };
        if exam.status == ExamStatus::Draft && tables.questions_for(&exam.paper_id).is_empty() {
            return Ok(Guarded::Refused(Refusal::EmptyPaper));
        }
        Ok(tables.transition_exam(exam_id, ExamStatus::Draft, ExamStatus::Published, now))
    }

    async fn complete_exam(
        &self,
        exam_id: &str,
        now: PrimitiveDateTime,
    ) -> StoreResult<Guarded<Exam>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.transition_exam(exam_id, ExamStatus::Published, ExamStatus::Completed, now))
    }

    async fn delete_exam(&self, exam_id: &str) -> StoreResult<Guarded<()>> {
        let mut tables = self.tables.lock().await;
        if !tables.exams.contains_key(exam_id) {
            return Ok(Guarded::Missing);
        }
        let attempts =
            tables.attempts.iter().filter(|attempt| attempt.exam_id == exam_id).count() as i64;
        if attempts > 0 {
            return Ok(Guarded::Refused(Refusal::HasAttempts(attempts)));
        }
        tables.exams.remove(exam_id);
        Ok(Guarded::Applied(()))
    }

    async fn has_attempt(&self, exam_id: &str, student_id: &str) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(!tables.attempts_for(exam_id, student_id).is_empty())
    }

    async fn create_attempt(&self, attempt: &Attempt) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.attempts_for(&attempt.exam_id, &attempt.student_id).is_empty() {
            return Ok(false);
        }
        tables.attempts.push(attempt.clone());
        Ok(true)
    }

    async fn find_attempt(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> StoreResult<Option<Attempt>> {
        let tables = self.tables.lock().await;
        let found = tables.attempts_for(exam_id, student_id);
        if found.len() > 1 {
            tracing::error!(
                exam_id,
                student_id,
                count = found.len(),
                "Multiple attempts stored for one exam and student"
            );
            return Err(StoreError::Invariant(format!(
                "{} attempts for exam {exam_id} and student {student_id}",
                found.len()
            )));
        }
        Ok(found.first().map(|attempt| (*attempt).clone()))
    }

    async fn list_answers(&self, attempt_id: &str) -> StoreResult<Vec<Answer>> {
        let tables = self.tables.lock().await;
        Ok(tables.answers.iter().filter(|answer| answer.attempt_id == attempt_id).cloned().collect())
    }

    async fn save_answer(&self, write: &AnswerWrite) -> StoreResult<Guarded<Answer>> {
        let mut tables = self.tables.lock().await;
        let Some(attempt) = tables.attempts.iter().find(|attempt| attempt.id == write.attempt_id)
        else {
            return Ok(Guarded::Missing);
        };
        if attempt.status.is_terminal() {
            return Ok(Guarded::Refused(Refusal::AttemptClosed(attempt.status)));
        }

        let existing = tables.answers.iter_mut().find(|answer| {
            answer.attempt_id == write.attempt_id && answer.question_id == write.question_id
        });
        let saved = match existing {
            Some(answer) => {
                answer.selected_option_id = write.selected_option_id.clone();
                answer.answer_text = write.answer_text.clone();
                answer.updated_at = write.now;
                answer.clone()
            }
            None => {
                let answer = Answer {
                    id: write.id.clone(),
                    attempt_id: write.attempt_id.clone(),
                    question_id: write.question_id.clone(),
                    selected_option_id: write.selected_option_id.clone(),
                    answer_text: write.answer_text.clone(),
                    marks_awarded: None,
                    created_at: write.now,
                    updated_at: write.now,
                };
                tables.answers.push(answer.clone());
                answer
            }
        };
        Ok(Guarded::Applied(saved))
    }

    async fn finalize_attempt(
        &self,
        attempt_id: &str,
        status: AttemptStatus,
        now: PrimitiveDateTime,
        grading: &GradingEngine,
    ) -> StoreResult<Option<Attempt>> {
        let mut tables = self.tables.lock().await;
        let Some(index) = tables.attempts.iter().position(|attempt| attempt.id == attempt_id)
        else {
            return Ok(None);
        };
        if tables.attempts[index].status.is_terminal() {
            return Ok(None);
        }

        let mut closed = tables.attempts[index].clone();
        closed.status = status;
        closed.submitted_at = Some(now);
        closed.updated_at = now;

        let paper_id = tables
            .exams
            .get(&closed.exam_id)
            .map(|exam| exam.paper_id.clone())
            .ok_or_else(|| StoreError::Invariant(format!("exam {} missing", closed.exam_id)))?;
        let questions = tables.questions_for(&paper_id);
        let answers: Vec<Answer> =
            tables.answers.iter().filter(|answer| answer.attempt_id == attempt_id).cloned().collect();

        let sheet = grading.grade(&closed, &questions, &answers)?;
        let awards: HashMap<&str, Option<f64>> = sheet
            .awards
            .iter()
            .map(|award| (award.answer_id.as_str(), award.marks_awarded))
            .collect();
        for answer in tables.answers.iter_mut() {
            if let Some(marks) = awards.get(answer.id.as_str()) {
                answer.marks_awarded = *marks;
                answer.updated_at = now;
            }
        }
        closed.score = Some(sheet.score);
        tables.attempts[index] = closed.clone();

        Ok(Some(closed))
    }

    async fn list_expiry_candidates(
        &self,
        now: PrimitiveDateTime,
    ) -> StoreResult<Vec<ExpiryCandidate>> {
        let tables = self.tables.lock().await;
        let mut candidates = Vec::new();
        for attempt in tables.attempts.iter().filter(|attempt| !attempt.status.is_terminal()) {
            let Some(exam) = tables.exams.get(&attempt.exam_id) else {
                continue;
            };
            let deadline = attempt.started_at + time::Duration::minutes(exam.duration_minutes.into());
            if deadline <= now {
                candidates.push(ExpiryCandidate {
                    attempt: attempt.clone(),
                    duration_minutes: exam.duration_minutes,
                });
            }
        }
        candidates.sort_by_key(|candidate| candidate.attempt.started_at);
        Ok(candidates)
    }

    async fn list_closed_attempts_for_exam(&self, exam_id: &str) -> StoreResult<Vec<Attempt>> {
        let tables = self.tables.lock().await;
        Ok(closed_sorted(
            tables
                .attempts
                .iter()
                .filter(|attempt| attempt.exam_id == exam_id && attempt.status.is_terminal())
                .cloned()
                .collect(),
        ))
    }

    async fn list_closed_attempts_for_student(
        &self,
        student_id: &str,
    ) -> StoreResult<Vec<Attempt>> {
        let tables = self.tables.lock().await;
        Ok(closed_sorted(
            tables
                .attempts
                .iter()
                .filter(|attempt| attempt.student_id == student_id && attempt.status.is_terminal())
                .cloned()
                .collect(),
        ))
    }
}
