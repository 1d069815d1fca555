use std::collections::HashMap;

use crate::core::config::ExamSettings;
use crate::db::models::{Answer, Attempt, PaperQuestion};
use crate::db::types::QuestionKind;

#[derive(Debug, thiserror::Error)]
pub(crate) enum GradingError {
    #[error("attempt {attempt_id} is {status} and cannot be graded")]
    AttemptOpen { attempt_id: String, status: &'static str },
}

/// Marks assigned to one stored answer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AnswerAward {
    pub(crate) answer_id: String,
    pub(crate) marks_awarded: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradeSheet {
    pub(crate) score: f64,
    pub(crate) awards: Vec<AnswerAward>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GradingEngine {
    pass_ratio: f64,
}

impl GradingEngine {
    pub(crate) fn new(pass_threshold_percent: u32) -> Self {
        Self { pass_ratio: f64::from(pass_threshold_percent) / 100.0 }
    }

    pub(crate) fn from_settings(settings: &ExamSettings) -> Self {
        Self::new(settings.pass_threshold_percent)
    }

    /// Auto-scores objective answers and totals the attempt.
    ///
    /// Free-text answers keep whatever marks they already carry; objective
    /// answers with no selection are left ungraded. The result depends only
    /// on the inputs, so grading a closed attempt twice yields the same sheet.
    pub(crate) fn grade(
        &self,
        attempt: &Attempt,
        questions: &[PaperQuestion],
        answers: &[Answer],
    ) -> Result<GradeSheet, GradingError> {
        if !attempt.status.is_terminal() {
            tracing::error!(
                attempt_id = %attempt.id,
                status = attempt.status.as_str(),
                "Grading invoked on an attempt that is still open"
            );
            return Err(GradingError::AttemptOpen {
                attempt_id: attempt.id.clone(),
                status: attempt.status.as_str(),
            });
        }

        let by_id: HashMap<&str, &PaperQuestion> =
            questions.iter().map(|entry| (entry.question.id.as_str(), entry)).collect();

        let mut score = 0.0;
        let mut awards = Vec::with_capacity(answers.len());
        for answer in answers {
            let marks_awarded = match by_id.get(answer.question_id.as_str()) {
                Some(entry) => award_for(entry, answer),
                None => {
                    tracing::warn!(
                        attempt_id = %attempt.id,
                        question_id = %answer.question_id,
                        "Answer references a question outside the exam paper"
                    );
                    answer.marks_awarded
                }
            };
            score += marks_awarded.unwrap_or(0.0);
            awards.push(AnswerAward { answer_id: answer.id.clone(), marks_awarded });
        }

        Ok(GradeSheet { score, awards })
    }

    /// Whether `score` reaches the pass threshold of `total_marks`.
    pub(crate) fn passes(&self, score: f64, total_marks: i64) -> bool {
        score >= total_marks as f64 * self.pass_ratio
    }

    /// Percentage of scores that pass, 0 for an empty slice.
    pub(crate) fn pass_rate(&self, scores: &[f64], total_marks: i64) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        let passed = scores.iter().filter(|score| self.passes(**score, total_marks)).count();
        passed as f64 / scores.len() as f64 * 100.0
    }
}

fn award_for(entry: &PaperQuestion, answer: &Answer) -> Option<f64> {
    match entry.question.kind {
        QuestionKind::FreeText => answer.marks_awarded,
        QuestionKind::Objective => {
            let selected = answer.selected_option_id.as_deref()?;
            let correct = entry.option(selected).is_some_and(|option| option.is_correct);
            Some(if correct { f64::from(entry.question.marks) } else { 0.0 })
        }
    }
}

/// Sum of question marks on a paper.
pub(crate) fn total_marks(questions: &[PaperQuestion]) -> i64 {
    questions.iter().map(|entry| i64::from(entry.question.marks)).sum()
}
