mod common;

use assessment_backend::config::{Config, ProctoringPolicy};
use assessment_backend::database::AssessmentStore;
use assessment_backend::models::assignment::{AssignmentStatus, TestAssignment};
use assessment_backend::models::session::{Answers, SessionStatus, TestSession};
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{TestApp, SECRET};
use serde_json::json;
use uuid::Uuid;

async fn start(app: &TestApp, token: &str, test_id: Uuid) -> (StatusCode, serde_json::Value) {
    app.send(
        Method::POST,
        "/api/sessions",
        Some(token),
        Some(json!({ "test_id": test_id })),
    )
    .await
}

#[tokio::test]
async fn seven_of_ten_correct_passes_at_seventy() {
    let app = TestApp::new();
    let test_id = app.seed_test(60, 70, 10).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);

    let (status, session) = start(&app, &token, test_id).await;
    assert_eq!(status, StatusCode::CREATED, "{}", session);
    assert_eq!(session["status"], "in_progress");
    assert_eq!(session["questions"].as_array().unwrap().len(), 10);
    assert!(session["seconds_remaining"].as_i64().unwrap() > 3590);
    assert!(session["questions"][0].get("correct_answer").is_none());
    assert_eq!(session["questions"][0]["options"][0]["label"], "A");
    let session_id = session["session_id"].as_str().unwrap().to_string();

    for i in 0..10 {
        let answer = if i < 7 { "A" } else { "B" };
        let (status, saved) = app
            .send(
                Method::PUT,
                &format!("/api/sessions/{}/answers", session_id),
                Some(&token),
                Some(json!({ "question_index": i, "answer": answer })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", saved);
        assert_eq!(saved["answered_count"], i + 1);
    }

    let (status, submitted) = app
        .send(
            Method::POST,
            &format!("/api/sessions/{}/submit", session_id),
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", submitted);
    assert_eq!(submitted["already_submitted"], false);
    assert_eq!(submitted["session_status"], "completed");
    assert_eq!(submitted["submitted_by"], "manual");
    assert_eq!(submitted["result"]["score"], 7);
    assert_eq!(submitted["result"]["percentage"], 70);
    assert_eq!(submitted["result"]["passed"], true);
    assert_eq!(submitted["result"]["time_spent_minutes"], 1);

    let (status, result) = app
        .send(
            Method::GET,
            &format!("/api/sessions/{}/result", session_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["id"], submitted["result"]["id"]);
    assert_eq!(result["detailed_results"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn submitting_twice_keeps_a_single_result() {
    let app = TestApp::new();
    let test_id = app.seed_test(30, 50, 2).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);

    let (_, session) = start(&app, &token, test_id).await;
    let uri = format!("/api/sessions/{}/submit", session["session_id"].as_str().unwrap());

    let (_, first) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "answers": { "0": "A" } })))
        .await;
    let (status, second) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "answers": { "1": "A" } })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["already_submitted"], false);
    assert_eq!(second["already_submitted"], true);
    assert_eq!(first["result"]["id"], second["result"]["id"]);
    assert_eq!(second["result"]["score"], 1);

    let (_, results) = app
        .send(Method::GET, "/api/results", Some(&app.admin_token()), None)
        .await;
    assert_eq!(results.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn completed_assignment_is_refused_without_questions() {
    let app = TestApp::new();
    let test_id = app.seed_test(30, 50, 3).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);

    let (_, session) = start(&app, &token, test_id).await;
    app.send(
        Method::POST,
        &format!("/api/sessions/{}/submit", session["session_id"].as_str().unwrap()),
        Some(&token),
        None,
    )
    .await;

    let (status, body) = start(&app, &token, test_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "test_already_completed");
    assert!(body["message"].as_str().unwrap().contains("already completed"));
    assert!(body.get("questions").is_none());
}

#[tokio::test]
async fn reopening_returns_the_same_session() {
    let app = TestApp::new();
    let test_id = app.seed_test(30, 50, 1).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);

    let (first_status, first) = start(&app, &token, test_id).await;
    let (second_status, second) = start(&app, &token, test_id).await;
    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["session_id"], second["session_id"]);
    assert_eq!(first["deadline_at"], second["deadline_at"]);
}

#[tokio::test]
async fn empty_code_is_rejected_before_anything_else() {
    let app = TestApp::new();
    let token = app.employee_token(Uuid::new_v4());
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/sessions/{}/run-code", Uuid::new_v4()),
            Some(&token),
            Some(json!({ "question_index": 0, "code": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn simulated_code_run_is_labelled_and_read_only() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let (_, test) = app
        .send(
            Method::POST,
            "/api/tests",
            Some(&admin),
            Some(json!({
                "title": "Algorithms",
                "domain": "engineering",
                "level": "junior",
                "duration_minutes": 45,
                "passing_score": 50
            })),
        )
        .await;
    let test_id: Uuid = test["id"].as_str().unwrap().parse().unwrap();
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/tests/{}/questions", test_id),
            Some(&admin),
            Some(json!({
                "type": "coding",
                "language": "python",
                "question": "Write a function returning the factorial of n",
                "correct_answer": "def factorial(n): ..."
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);
    let (_, session) = start(&app, &token, test_id).await;
    assert_eq!(session["questions"][0]["view"], "code");
    let session_id = session["session_id"].as_str().unwrap();

    let (status, report) = app
        .send(
            Method::POST,
            &format!("/api/sessions/{}/run-code", session_id),
            Some(&token),
            Some(json!({
                "question_index": 0,
                "code": "def factorial(n):\n    return 1 if n < 2 else n * factorial(n - 1)"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["mode"], "simulated");
    assert_eq!(report["total"], 3);
    assert_eq!(report["passed"], 3);

    let (_, view) = app
        .send(Method::GET, &format!("/api/sessions/{}", session_id), Some(&token), None)
        .await;
    assert_eq!(view["status"], "in_progress");
    assert!(view["answers"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn proctoring_counters_grow_and_auto_submit_when_enabled() {
    let mut config = Config::for_memory(SECRET);
    config.proctoring = ProctoringPolicy {
        max_tab_switches: 2,
        auto_submit: true,
        ..ProctoringPolicy::default()
    };
    let app = TestApp::with_config(config);
    let test_id = app.seed_test(30, 50, 2).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);
    let (_, session) = start(&app, &token, test_id).await;
    let uri = format!("/api/sessions/{}/proctoring", session["session_id"].as_str().unwrap());

    let mut last_tabs = 0;
    let mut last_score = 100;
    for i in 1..=3 {
        let (status, body) = app
            .send(Method::POST, &uri, Some(&token), Some(json!({ "event_type": "tab_switch" })))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["accepted"], true);
        assert_eq!(body["event"]["severity"], "medium");
        let tabs = body["proctoring"]["tab_switches"].as_u64().unwrap();
        let score = body["proctoring"]["security_score"].as_u64().unwrap();
        assert!(tabs > last_tabs);
        assert!(score < last_score);
        last_tabs = tabs;
        last_score = score;
        assert_eq!(body["auto_submitted"], i == 3);
    }
    assert_eq!(last_score, 70);

    let (status, body) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "event_type": "devtools_open" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], false);
    assert_eq!(body["proctoring"]["tab_switches"], 3);
    assert_eq!(body["session_status"], "completed");
}

#[tokio::test]
async fn overdue_assignment_is_forbidden() {
    let app = TestApp::new();
    let test_id = app.seed_test(30, 50, 1).await;
    let user = Uuid::new_v4();
    let now = Utc::now();
    app.store
        .insert_assignment(&TestAssignment {
            id: Uuid::new_v4(),
            organization_id: app.org,
            test_id,
            user_id: user,
            assigned_by: app.admin,
            status: AssignmentStatus::Assigned,
            due_date: Some(now - Duration::hours(2)),
            max_attempts: 1,
            attempts_used: 0,
            created_at: now - Duration::days(1),
            updated_at: now - Duration::days(1),
        })
        .await
        .unwrap();

    let (status, body) = start(&app, &app.employee_token(user), test_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "assignment_overdue");
}

#[tokio::test]
async fn timer_sweep_and_late_submit_share_one_result() {
    let app = TestApp::new();
    let test_id = app.seed_test(10, 50, 2).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);
    let (_, session) = start(&app, &token, test_id).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let report = app
        .state
        .session_service
        .sweep(Utc::now() + Duration::minutes(11))
        .await
        .unwrap();
    assert_eq!(report.timed_out, 1);

    let (status, submitted) = app
        .send(
            Method::POST,
            &format!("/api/sessions/{}/submit", session_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["already_submitted"], true);
    assert_eq!(submitted["session_status"], "timed_out");
    assert_eq!(submitted["submitted_by"], "timer");
    assert_eq!(submitted["result"]["time_spent_minutes"], 10);

    let (_, view) = app
        .send(Method::GET, &format!("/api/sessions/{}", session_id), Some(&token), None)
        .await;
    assert_eq!(view["seconds_remaining"], 0);
    assert!(view["questions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sessions_are_private_to_their_owner() {
    let app = TestApp::new();
    let test_id = app.seed_test(30, 50, 1).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let (_, session) = start(&app, &app.employee_token(user), test_id).await;

    let intruder = app.employee_token(Uuid::new_v4());
    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/sessions/{}", session["session_id"].as_str().unwrap()),
            Some(&intruder),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn my_assignments_lists_only_the_caller() {
    let app = TestApp::new();
    let test_id = app.seed_test(30, 50, 1).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    app.assign(test_id, Uuid::new_v4(), 1).await;

    let (status, body) = app
        .send(Method::GET, "/api/my/assignments", Some(&app.employee_token(user)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["status"], "assigned");
}

#[tokio::test]
async fn malformed_submit_is_rejected_and_keeps_the_session_open() {
    let app = TestApp::new();
    let test_id = app.seed_test(30, 50, 2).await;
    let user = Uuid::new_v4();
    app.assign(test_id, user, 1).await;
    let token = app.employee_token(user);
    let (_, session) = start(&app, &token, test_id).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let submit_uri = format!("/api/sessions/{}/submit", session_id);

    for body in [r#"{"answers":{"first":"A"}}"#, r#"{"answers":"#, "[1,2]"] {
        let (status, error) = app
            .send_text(Method::POST, &submit_uri, Some(&token), body, Some("application/json"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(error["error"], "invalid_json");
    }

    let (_, view) = app
        .send(Method::GET, &format!("/api/sessions/{}", session_id), Some(&token), None)
        .await;
    assert_eq!(view["status"], "in_progress");

    // Answers still count when the client leaves out the content type.
    let (status, submitted) = app
        .send_text(
            Method::POST,
            &submit_uri,
            Some(&token),
            r#"{"answers":{"0":"A","1":"A"}}"#,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", submitted);
    assert_eq!(submitted["result"]["score"], 2);
    assert_eq!(submitted["session_status"], "completed");
}

async fn plant_expired_session(app: &TestApp, test_id: Uuid, user: Uuid) -> Uuid {
    let (_, assignments) = app
        .send(
            Method::GET,
            "/api/my/assignments",
            Some(&app.employee_token(user)),
            None,
        )
        .await;
    let assignment_id: Uuid = assignments[0]["id"].as_str().unwrap().parse().unwrap();

    let now = Utc::now();
    let session = TestSession {
        id: Uuid::new_v4(),
        assignment_id,
        test_id,
        user_id: user,
        status: SessionStatus::InProgress,
        started_at: now - Duration::minutes(30),
        deadline_at: now - Duration::minutes(20),
        completed_at: None,
        time_spent_minutes: None,
        score: None,
        answers: Answers::new(),
        proctoring: Default::default(),
        proctoring_events: Vec::new(),
        submitted_by: None,
    };
    app.store.create_session(&session).await.unwrap();
    session.id
}

#[tokio::test]
async fn expired_session_is_closed_instead_of_resumed() {
    let app = TestApp::new();
    let test_id = app.seed_test(10, 50, 2).await;

    let single = Uuid::new_v4();
    app.assign(test_id, single, 1).await;
    let stale = plant_expired_session(&app, test_id, single).await;
    let token = app.employee_token(single);
    let (status, body) = start(&app, &token, test_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "test_already_completed");
    let (_, view) = app
        .send(Method::GET, &format!("/api/sessions/{}", stale), Some(&token), None)
        .await;
    assert_eq!(view["status"], "timed_out");

    let retrying = Uuid::new_v4();
    app.assign(test_id, retrying, 2).await;
    let stale = plant_expired_session(&app, test_id, retrying).await;
    let (status, fresh) = start(&app, &app.employee_token(retrying), test_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(fresh["status"], "in_progress");
    assert_ne!(fresh["session_id"].as_str().unwrap(), stale.to_string());
    assert_eq!(fresh["questions"].as_array().unwrap().len(), 2);
}
