use axum::http::{Method, StatusCode};
use serde_json::json;
use time::Duration;
use tower::ServiceExt;

use crate::test_support::{self, json_request, read_json, TestContext};

const TEACHER: Option<(&str, &str)> = Some(("teacher-1", "teacher"));
const STUDENT: Option<(&str, &str)> = Some(("student-1", "student"));

async fn send(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(json_request(method, uri, actor, body))
        .await
        .expect("response");
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return (status, serde_json::Value::Null);
    }
    (status, read_json(response).await)
}

fn objective_question(prompt: &str) -> serde_json::Value {
    json!({
        "kind": "objective",
        "prompt": prompt,
        "marks": 5,
        "options": [
            { "body": "Hydrogen", "is_correct": true },
            { "body": "Helium" },
            { "body": "Lithium" }
        ]
    })
}

/// Creates a paper with one objective and one free-text question.
async fn create_paper(ctx: &TestContext) -> (String, serde_json::Value) {
    let (status, paper) = send(
        ctx,
        Method::POST,
        "/api/v1/papers",
        TEACHER,
        Some(json!({ "title": "Periodic table", "subject": "Chemistry" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(paper["total_marks"], 0);
    let paper_id = paper["id"].as_str().expect("paper id").to_string();

    let (status, question) = send(
        ctx,
        Method::POST,
        &format!("/api/v1/papers/{paper_id}/questions"),
        TEACHER,
        Some(objective_question("Lightest element?")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        ctx,
        Method::POST,
        &format!("/api/v1/papers/{paper_id}/questions"),
        TEACHER,
        Some(json!({ "kind": "free_text", "prompt": "Explain valence.", "marks": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (paper_id, question)
}

async fn create_exam(ctx: &TestContext, paper_id: &str) -> String {
    let (status, exam) = send(
        ctx,
        Method::POST,
        "/api/v1/exams",
        TEACHER,
        Some(json!({
            "batch_id": "batch-1",
            "paper_id": paper_id,
            "title": "Chemistry quiz",
            "start_time": "2025-03-10T08:30:00Z",
            "end_time": "2025-03-10T11:00:00Z",
            "duration_minutes": 45
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(exam["status"], "draft");
    exam["id"].as_str().expect("exam id").to_string()
}

#[tokio::test]
async fn teacher_builds_publishes_and_reports_on_an_exam() {
    let ctx = test_support::setup_test_context().await;
    let (paper_id, question) = create_paper(&ctx).await;
    let exam_id = create_exam(&ctx, &paper_id).await;

    let (status, paper) =
        send(&ctx, Method::GET, &format!("/api/v1/papers/{paper_id}"), TEACHER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paper["total_marks"], 15);
    assert_eq!(paper["questions"][0]["options"][0]["is_correct"], true);

    let (status, _) = send(
        &ctx,
        Method::PUT,
        "/api/v1/batches/batch-1/students/student-1",
        TEACHER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &ctx,
        Method::PUT,
        "/api/v1/batches/batch-1/students/student-1",
        TEACHER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, published) =
        send(&ctx, Method::POST, &format!("/api/v1/exams/{exam_id}/publish"), TEACHER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");
    assert!(published["published_at"].is_string());

    let question_id = question["id"].as_str().expect("question id");
    let correct = question["options"][0]["id"].as_str().expect("option id");
    send(&ctx, Method::POST, &format!("/api/v1/student/exams/{exam_id}/start"), STUDENT, None)
        .await;
    send(
        &ctx,
        Method::POST,
        &format!("/api/v1/student/exams/{exam_id}/answers"),
        STUDENT,
        Some(json!({ "question_id": question_id, "selected_option_id": correct })),
    )
    .await;
    ctx.clock.advance(Duration::minutes(5));
    let (status, _) =
        send(&ctx, Method::POST, &format!("/api/v1/student/exams/{exam_id}/submit"), STUDENT, None)
            .await;
    assert_eq!(status, StatusCode::OK);

    let (status, summary) =
        send(&ctx, Method::GET, &format!("/api/v1/exams/{exam_id}/results"), TEACHER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_students"], 1);
    assert_eq!(summary["total_attempts"], 1);
    assert_eq!(summary["total_marks"], 15);
    assert_eq!(summary["average_score"], 5.0);
    assert_eq!(summary["pass_rate"], 0.0);

    let (status, performance) =
        send(&ctx, Method::GET, "/api/v1/students/student-1/performance", TEACHER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(performance["total_exams"], 1);
    assert_eq!(performance["highest_score"], 5.0);

    let (status, check) = send(
        &ctx,
        Method::GET,
        &format!("/api/v1/exams/{exam_id}/attempts/student-1/score"),
        TEACHER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["recomputed_score"], 5.0);
    assert_eq!(check["consistent"], true);

    let (status, completed) =
        send(&ctx, Method::POST, &format!("/api/v1/exams/{exam_id}/complete"), TEACHER, None)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
}

#[tokio::test]
async fn lifecycle_guards_surface_as_conflicts() {
    let ctx = test_support::setup_test_context().await;
    let (paper_id, question) = create_paper(&ctx).await;
    let exam_id = create_exam(&ctx, &paper_id).await;

    let (status, body) =
        send(&ctx, Method::POST, &format!("/api/v1/exams/{exam_id}/complete"), TEACHER, None)
            .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state");

    send(&ctx, Method::PUT, "/api/v1/batches/batch-1/students/student-1", TEACHER, None).await;
    send(&ctx, Method::POST, &format!("/api/v1/exams/{exam_id}/publish"), TEACHER, None).await;

    let question_id = question["id"].as_str().expect("question id");
    let (status, body) = send(
        &ctx,
        Method::DELETE,
        &format!("/api/v1/papers/{paper_id}/questions/{question_id}"),
        TEACHER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state");

    send(&ctx, Method::POST, &format!("/api/v1/student/exams/{exam_id}/start"), STUDENT, None)
        .await;
    let (status, body) =
        send(&ctx, Method::DELETE, &format!("/api/v1/exams/{exam_id}"), TEACHER, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state");
}

#[tokio::test]
async fn draft_exam_can_be_deleted() {
    let ctx = test_support::setup_test_context().await;
    let (paper_id, _) = create_paper(&ctx).await;
    let exam_id = create_exam(&ctx, &paper_id).await;

    let (status, _) =
        send(&ctx, Method::DELETE, &format!("/api/v1/exams/{exam_id}"), TEACHER, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) =
        send(&ctx, Method::GET, &format!("/api/v1/exams/{exam_id}"), TEACHER, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn invalid_authoring_input_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    let (paper_id, _) = create_paper(&ctx).await;

    let (status, body) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/papers/{paper_id}/questions"),
        TEACHER,
        Some(json!({
            "kind": "objective",
            "prompt": "Two right answers?",
            "marks": 2,
            "options": [
                { "body": "Yes", "is_correct": true },
                { "body": "Also yes", "is_correct": true }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/api/v1/exams",
        TEACHER,
        Some(json!({
            "batch_id": "batch-1",
            "paper_id": paper_id,
            "title": "Backwards",
            "start_time": "2025-03-10T11:00:00Z",
            "end_time": "2025-03-10T08:00:00Z",
            "duration_minutes": 30
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn staff_routes_reject_students() {
    let ctx = test_support::setup_test_context().await;

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/api/v1/papers",
        STUDENT,
        Some(json!({ "title": "Sneaky" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, _) =
        send(&ctx, Method::DELETE, "/api/v1/batches/batch-1/students/student-1", TEACHER, None)
            .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
