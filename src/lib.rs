pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use reqwest::Client;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::database::AssessmentStore;
use crate::error::{Error, Result};
use crate::middleware::auth::{require_admin, require_auth};
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::services::{
    analytics_service::AnalyticsService,
    assignment_service::AssignmentService,
    code_runner::{CodeRunner, ExecutionBackend, HttpExecutionBackend},
    session_service::SessionService,
    test_service::TestService,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AssessmentStore>,
    pub config: Arc<Config>,
    pub session_service: SessionService,
    pub test_service: TestService,
    pub assignment_service: AssignmentService,
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub fn new(store: Arc<dyn AssessmentStore>, config: Arc<Config>) -> Result<Self> {
        let backend: Option<Arc<dyn ExecutionBackend>> = match &config.code_execution_url {
            Some(url) => {
                let http_client = Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()
                    .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
                let backend: Arc<dyn ExecutionBackend> =
                    Arc::new(HttpExecutionBackend::new(url.clone(), http_client));
                Some(backend)
            }
            None => None,
        };
        Ok(Self::with_runner(store, config, CodeRunner::new(backend)))
    }

    pub fn with_runner(
        store: Arc<dyn AssessmentStore>,
        config: Arc<Config>,
        runner: CodeRunner,
    ) -> Self {
        Self {
            session_service: SessionService::new(store.clone(), &config, runner),
            test_service: TestService::new(store.clone()),
            assignment_service: AssignmentService::new(store.clone()),
            analytics_service: AnalyticsService::new(store.clone(), config.proctoring.clone()),
            store,
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let session_api = Router::new()
        .route("/api/sessions", post(routes::sessions::create_session))
        .route("/api/sessions/:id", get(routes::sessions::get_session))
        .route("/api/sessions/:id/answers", put(routes::sessions::save_answer))
        .route("/api/sessions/:id/run-code", post(routes::sessions::run_code))
        .route(
            "/api/sessions/:id/proctoring",
            post(routes::sessions::record_proctoring),
        )
        .route("/api/sessions/:id/submit", post(routes::sessions::submit_session))
        .route("/api/sessions/:id/result", get(routes::sessions::get_result))
        .route("/api/my/assignments", get(routes::sessions::my_assignments))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_api = Router::new()
        .route(
            "/api/tests",
            get(routes::admin::list_tests).post(routes::admin::create_test),
        )
        .route("/api/tests/:id", get(routes::admin::get_test))
        .route(
            "/api/tests/:id/questions",
            get(routes::admin::list_questions).post(routes::admin::add_question),
        )
        .route("/api/questions/:id/review", patch(routes::admin::review_question))
        .route(
            "/api/assignments",
            get(routes::admin::list_assignments).post(routes::admin::create_assignments),
        )
        .route("/api/results", get(routes::admin::list_results))
        .route("/api/results/export", get(routes::admin::export_results))
        .route("/api/analytics/tests/:id", get(routes::admin::test_analytics))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_admin));

    let api = session_api.merge(admin_api).layer(axum::middleware::from_fn_with_state(
        RateLimiter::new(state.config.api_rps),
        rps_middleware,
    ));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(api)
        .with_state(state)
        .layer(crate::middleware::cors::api_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
}
