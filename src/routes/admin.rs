use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::admin_dto::{
        AssignmentQuery, CreateAssignmentsRequest, CreateQuestionRequest, CreateTestRequest,
        ResultQuery, ReviewQuestionRequest,
    },
    error::Result,
    middleware::auth::Claims,
    services::export_service::{ExportService, XLSX_CONTENT_TYPE},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/tests",
    request_body = CreateTestRequest,
    responses(
        (status = 201, description = "Test created"),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let test = state
        .test_service
        .create_test(claims.org, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(test)))
}

#[utoipa::path(
    get,
    path = "/api/tests",
    responses((status = 200, description = "Tests of the caller's organization"))
)]
#[axum::debug_handler]
pub async fn list_tests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let tests = state.test_service.list_tests(claims.org).await?;
    Ok(Json(tests))
}

#[utoipa::path(
    get,
    path = "/api/tests/{id}",
    params(("id" = Uuid, Path, description = "Test ID")),
    responses(
        (status = 200, description = "Test with question counts"),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state.test_service.get_test(claims.org, id).await?;
    Ok(Json(test))
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state
        .test_service
        .add_question(claims.org, test_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Admin view: includes correct answers and execution cases.
#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let questions = state.test_service.list_questions(claims.org, test_id).await?;
    Ok(Json(questions))
}

#[utoipa::path(
    patch,
    path = "/api/questions/{id}/review",
    params(("id" = Uuid, Path, description = "Question ID")),
    request_body = ReviewQuestionRequest,
    responses(
        (status = 200, description = "Question status updated"),
        (status = 409, description = "Transition not allowed")
    )
)]
#[axum::debug_handler]
pub async fn review_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewQuestionRequest>,
) -> Result<impl IntoResponse> {
    let question = state
        .test_service
        .review_question(claims.org, id, payload.status)
        .await?;
    Ok(Json(question))
}

#[utoipa::path(
    post,
    path = "/api/assignments",
    request_body = CreateAssignmentsRequest,
    responses(
        (status = 201, description = "Assignments created"),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn create_assignments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateAssignmentsRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state
        .assignment_service
        .assign(claims.org, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AssignmentQuery>,
) -> Result<impl IntoResponse> {
    let assignments = state.assignment_service.list(claims.org, query).await?;
    Ok(Json(assignments))
}

#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ResultQuery>,
) -> Result<impl IntoResponse> {
    let results = state.analytics_service.list_results(claims.org, query).await?;
    Ok(Json(results))
}

/// Results as an XLSX workbook, filtered like `GET /api/results`.
#[axum::debug_handler]
pub async fn export_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ResultQuery>,
) -> Result<impl IntoResponse> {
    let (results, tests) = state
        .analytics_service
        .results_with_tests(claims.org, query)
        .await?;
    let buffer = ExportService::generate_results_xlsx(&results, &tests)?;
    let filename = format!("results_{}.xlsx", chrono::Utc::now().format("%Y%m%d"));
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}

#[utoipa::path(
    get,
    path = "/api/analytics/tests/{id}",
    params(("id" = Uuid, Path, description = "Test ID")),
    responses(
        (status = 200, description = "Aggregated session and result statistics"),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn test_analytics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let analytics = state.analytics_service.test_analytics(claims.org, id).await?;
    Ok(Json(analytics))
}
