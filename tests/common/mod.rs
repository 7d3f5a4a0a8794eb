#![allow(dead_code)]

use std::sync::Arc;

use assessment_backend::{
    build_router, config::Config, database::MemoryStore, middleware::auth::Claims,
    services::code_runner::CodeRunner, AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, request::Builder as RequestBuilder, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "test_secret_key";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub org: Uuid,
    pub admin: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::for_memory(SECRET))
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_runner(store.clone(), Arc::new(config), CodeRunner::default());
        Self {
            router: build_router(state.clone()),
            state,
            store,
            org: Uuid::new_v4(),
            admin: Uuid::new_v4(),
        }
    }

    pub fn admin_token(&self) -> String {
        token(self.admin, self.org, "admin")
    }

    pub fn employee_token(&self, user_id: Uuid) -> String {
        token(user_id, self.org, "employee")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let (status, _, bytes) = self.send_raw(method, uri, token, body).await;
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, Option<String>, Vec<u8>) {
        let builder = authorized(Request::builder().method(method).uri(uri), token);
        let req = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(req).await
    }

    /// Sends `body` verbatim, with an optional content type.
    pub async fn send_text(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &str,
        content_type: Option<&str>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = authorized(Request::builder().method(method).uri(uri), token);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        let (status, _, bytes) = self.dispatch(req).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null))
    }

    async fn dispatch(&self, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, content_type, bytes.to_vec())
    }

    /// Creates a test with `n` approved MCQ questions whose correct answer is `"A"`.
    pub async fn seed_test(&self, duration_minutes: i32, passing_score: i32, n: usize) -> Uuid {
        let admin = self.admin_token();
        let (status, test) = self
            .send(
                Method::POST,
                "/api/tests",
                Some(&admin),
                Some(serde_json::json!({
                    "title": "Backend fundamentals",
                    "domain": "engineering",
                    "level": "middle",
                    "duration_minutes": duration_minutes,
                    "passing_score": passing_score
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", test);
        let test_id = test["id"].as_str().unwrap().to_string();

        for i in 0..n {
            let (status, q) = self
                .send(
                    Method::POST,
                    &format!("/api/tests/{}/questions", test_id),
                    Some(&admin),
                    Some(serde_json::json!({
                        "type": "mcq",
                        "options": ["yes", "no"],
                        "question": format!("Question {}", i),
                        "correct_answer": "A"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", q);
            let (status, _) = self
                .send(
                    Method::PATCH,
                    &format!("/api/questions/{}/review", q["id"].as_str().unwrap()),
                    Some(&admin),
                    Some(serde_json::json!({ "status": "approved" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }
        test_id.parse().unwrap()
    }

    pub async fn assign(&self, test_id: Uuid, user_id: Uuid, max_attempts: i32) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/assignments",
                Some(&self.admin_token()),
                Some(serde_json::json!({
                    "test_id": test_id,
                    "user_ids": [user_id],
                    "max_attempts": max_attempts
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }
}

fn authorized(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(t) => builder.header(header::AUTHORIZATION, format!("Bearer {}", t)),
        None => builder,
    }
}

pub fn token(sub: Uuid, org: Uuid, role: &str) -> String {
    let claims = Claims {
        sub,
        org,
        role: role.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}
