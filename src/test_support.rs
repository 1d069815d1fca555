use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
};
use time::PrimitiveDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::clock::{Clock, ManualClock};
use crate::core::{config::Settings, state::AppState};
use crate::store::MemoryStore;

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: api::router::App,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) clock: Arc<ManualClock>,
    _guard: OwnedMutexGuard<()>,
}

impl TestContext {
    pub(crate) fn clock_now(&self) -> PrimitiveDateTime {
        self.clock.now()
    }
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMHALL_ENV", "test");
    std::env::set_var("EXAMHALL_STRICT_CONFIG", "0");
    std::env::set_var("EXAMHALL_STORE", "memory");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("PASS_THRESHOLD_PERCENT");
    std::env::remove_var("MIN_OPTIONS_PER_QUESTION");
    std::env::remove_var("MAX_OPTIONS_PER_QUESTION");
    std::env::remove_var("EXPIRY_SWEEP_ENABLED");
}

/// Memory-backed state with the clock parked at [`fixtures::t0`].
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(fixtures::t0()));

    let state = AppState::new(settings, store.clone(), clock.clone());
    let app = api::router::app(state.clone());

    TestContext { state, app, store, clock, _guard: guard }
}

/// Request carrying the gateway identity headers.
pub(crate) fn json_request(
    method: Method,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some((id, role)) = actor {
        builder = builder.header("x-actor-id", id).header("x-actor-role", role);
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

pub(crate) mod fixtures {
    use time::macros::datetime;
    use time::{Duration, PrimitiveDateTime};

    use super::TestContext;
    use crate::db::models::{
        Answer, Attempt, Exam, PaperQuestion, Question, QuestionOption, QuestionPaper,
    };
    use crate::db::types::{AttemptStatus, ExamStatus, QuestionKind};
    use crate::services::answer_register::{self, AnswerPayload};
    use crate::services::exam_admin::NewExam;
    use crate::store::{ExamStore, Guarded};

    pub(crate) fn t0() -> PrimitiveDateTime {
        datetime!(2025-03-10 09:00:00)
    }

    pub(crate) fn question_id(paper_id: &str, number: usize) -> String {
        format!("{paper_id}-q{number}")
    }

    pub(crate) fn option_id(question_id: &str, label: &str) -> String {
        format!("{question_id}-{label}")
    }

    fn objective(paper_id: &str, number: usize, correct: &str) -> PaperQuestion {
        let id = question_id(paper_id, number);
        let options = ["A", "B", "C", "D"]
            .iter()
            .enumerate()
            .map(|(index, label)| QuestionOption {
                id: option_id(&id, label),
                question_id: id.clone(),
                body: format!("Option {label}"),
                is_correct: *label == correct,
                position: index as i32 + 1,
            })
            .collect();
        PaperQuestion {
            question: Question {
                id,
                paper_id: paper_id.to_string(),
                kind: QuestionKind::Objective,
                prompt: format!("Objective question {number}"),
                marks: 10,
                position: number as i32,
                created_at: t0(),
            },
            options,
        }
    }

    /// Two objective questions worth 10 (correct option B) and one
    /// free-text question worth 10.
    pub(crate) fn scenario_paper(paper_id: &str) -> Vec<PaperQuestion> {
        vec![
            objective(paper_id, 1, "B"),
            objective(paper_id, 2, "B"),
            PaperQuestion {
                question: Question {
                    id: question_id(paper_id, 3),
                    paper_id: paper_id.to_string(),
                    kind: QuestionKind::FreeText,
                    prompt: "Explain your reasoning".into(),
                    marks: 10,
                    position: 3,
                    created_at: t0(),
                },
                options: Vec::new(),
            },
        ]
    }

    pub(crate) fn exam(id: &str, batch_id: &str, paper_id: &str, status: ExamStatus) -> Exam {
        Exam {
            id: id.to_string(),
            batch_id: batch_id.to_string(),
            paper_id: paper_id.to_string(),
            title: format!("Exam {id}"),
            start_time: t0() - Duration::hours(1),
            end_time: t0() + Duration::hours(1),
            duration_minutes: 60,
            status,
            created_at: t0() - Duration::days(1),
            updated_at: t0() - Duration::days(1),
            published_at: None,
        }
    }

    pub(crate) fn new_exam(paper_id: &str) -> NewExam {
        NewExam {
            batch_id: "batch-1".into(),
            paper_id: paper_id.to_string(),
            title: "Midterm".into(),
            start_time: t0() - Duration::hours(1),
            end_time: t0() + Duration::hours(1),
            duration_minutes: 60,
        }
    }

    pub(crate) fn attempt(id: &str, exam_id: &str, student_id: &str) -> Attempt {
        Attempt {
            id: id.to_string(),
            exam_id: exam_id.to_string(),
            student_id: student_id.to_string(),
            started_at: t0(),
            submitted_at: None,
            score: None,
            status: AttemptStatus::InProgress,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    fn answer(attempt_id: &str, question: &PaperQuestion) -> Answer {
        Answer {
            id: format!("{attempt_id}-{}", question.question.id),
            attempt_id: attempt_id.to_string(),
            question_id: question.question.id.clone(),
            selected_option_id: None,
            answer_text: None,
            marks_awarded: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    pub(crate) fn objective_answer(
        attempt_id: &str,
        question: &PaperQuestion,
        label: &str,
    ) -> Answer {
        Answer {
            selected_option_id: Some(option_id(&question.question.id, label)),
            ..answer(attempt_id, question)
        }
    }

    pub(crate) fn free_text_answer(attempt_id: &str, question: &PaperQuestion, text: &str) -> Answer {
        Answer { answer_text: Some(text.to_string()), ..answer(attempt_id, question) }
    }

    pub(crate) async fn seed_paper(store: &dyn ExamStore, paper_id: &str) {
        store
            .insert_paper(&QuestionPaper {
                id: paper_id.to_string(),
                title: "Scenario paper".into(),
                subject: Some("Chemistry".into()),
                created_by: Some("teacher-1".into()),
                created_at: t0(),
                updated_at: t0(),
            })
            .await
            .expect("paper");
        for question in scenario_paper(paper_id) {
            let outcome = store.insert_question(&question).await.expect("question");
            assert!(matches!(outcome, Guarded::Applied(_)));
        }
    }

    /// `exam-1` on `paper-1`, published for `batch-1` with `student-1` enrolled.
    pub(crate) async fn seed_published_exam(ctx: &TestContext) {
        seed_paper(ctx.store.as_ref(), "paper-1").await;
        ctx.store
            .insert_exam(&exam("exam-1", "batch-1", "paper-1", ExamStatus::Published))
            .await
            .expect("exam");
        ctx.store.add_batch_member("batch-1", "student-1", t0()).await.expect("member");
    }

    /// Answers both objective questions of `paper-1` with option B.
    pub(crate) async fn answer_scenario_correctly(ctx: &TestContext) {
        for number in [1, 2] {
            let question = question_id("paper-1", number);
            answer_register::save(
                &ctx.state,
                "exam-1",
                "student-1",
                &question,
                AnswerPayload { selected_option_id: Some(option_id(&question, "B")), answer_text: None },
            )
            .await
            .expect("answer");
        }
    }
}
