use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

use crate::core::time::{format_primitive, to_primitive_utc};
use crate::db::models::{Exam, PaperQuestion, QuestionPaper};
use crate::db::types::{ExamStatus, QuestionKind};
use crate::services::exam_admin::{NewExam, NewOption, NewQuestion, PaperDetail};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct PaperCreate {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "subject must be at most 255 characters"))]
    pub(crate) subject: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct OptionCreate {
    #[validate(length(min = 1, message = "option text must not be empty"))]
    pub(crate) body: String,
    #[serde(default, alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    pub(crate) kind: QuestionKind,
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub(crate) prompt: String,
    #[validate(range(min = 1, message = "marks must be a positive integer"))]
    pub(crate) marks: i32,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Vec<OptionCreate>,
}

impl From<QuestionCreate> for NewQuestion {
    fn from(payload: QuestionCreate) -> Self {
        Self {
            kind: payload.kind,
            prompt: payload.prompt,
            marks: payload.marks,
            options: payload
                .options
                .into_iter()
                .map(|option| NewOption { body: option.body, is_correct: option.is_correct })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[serde(alias = "batchId")]
    #[validate(length(min = 1, message = "batch_id must not be empty"))]
    pub(crate) batch_id: String,
    #[serde(alias = "paperId")]
    #[validate(length(min = 1, message = "paper_id must not be empty"))]
    pub(crate) paper_id: String,
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: String,
    #[serde(alias = "startTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(alias = "endTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) end_time: OffsetDateTime,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
}

impl From<ExamCreate> for NewExam {
    fn from(payload: ExamCreate) -> Self {
        Self {
            batch_id: payload.batch_id,
            paper_id: payload.paper_id,
            title: payload.title,
            start_time: to_primitive_utc(payload.start_time),
            end_time: to_primitive_utc(payload.end_time),
            duration_minutes: payload.duration_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) batch_id: String,
    pub(crate) paper_id: String,
    pub(crate) title: String,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) status: ExamStatus,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) published_at: Option<String>,
}

impl From<Exam> for ExamResponse {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            batch_id: exam.batch_id,
            paper_id: exam.paper_id,
            title: exam.title,
            start_time: format_primitive(exam.start_time),
            end_time: format_primitive(exam.end_time),
            duration_minutes: exam.duration_minutes,
            status: exam.status,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
            published_at: exam.published_at.map(format_primitive),
        }
    }
}

/// Staff view of an option, correctness included.
#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) id: String,
    pub(crate) body: String,
    pub(crate) is_correct: bool,
    pub(crate) position: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) paper_id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) marks: i32,
    pub(crate) position: i32,
    pub(crate) options: Vec<OptionResponse>,
}

impl From<PaperQuestion> for QuestionResponse {
    fn from(entry: PaperQuestion) -> Self {
        Self {
            id: entry.question.id,
            paper_id: entry.question.paper_id,
            kind: entry.question.kind,
            prompt: entry.question.prompt,
            marks: entry.question.marks,
            position: entry.question.position,
            options: entry
                .options
                .into_iter()
                .map(|option| OptionResponse {
                    id: option.id,
                    body: option.body,
                    is_correct: option.is_correct,
                    position: option.position,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaperResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) subject: Option<String>,
    pub(crate) created_by: Option<String>,
    pub(crate) created_at: String,
    pub(crate) total_marks: i64,
    pub(crate) questions: Vec<QuestionResponse>,
}

impl PaperResponse {
    pub(crate) fn empty(paper: QuestionPaper) -> Self {
        Self::from(PaperDetail { paper, questions: Vec::new(), total_marks: 0 })
    }
}

impl From<PaperDetail> for PaperResponse {
    fn from(detail: PaperDetail) -> Self {
        Self {
            id: detail.paper.id,
            title: detail.paper.title,
            subject: detail.paper.subject,
            created_by: detail.paper.created_by,
            created_at: format_primitive(detail.paper.created_at),
            total_marks: detail.total_marks,
            questions: detail.questions.into_iter().map(QuestionResponse::from).collect(),
        }
    }
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Naive timestamps are taken as UTC.
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }
    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}
