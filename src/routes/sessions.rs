use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::session_dto::{
        CreateSessionRequest, ProctoringEventRequest, RunCodeRequest, SaveAnswerRequest,
        SubmitSessionRequest,
    },
    error::Result,
    middleware::auth::Claims,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session started"),
        (status = 200, description = "An in-progress session already existed and is returned"),
        (status = 403, description = "Assignment is overdue"),
        (status = 404, description = "No assignment for this test"),
        (status = 409, description = "Test already completed")
    )
)]
#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (view, created) = state
        .session_service
        .start_session(claims.sub, payload.test_id)
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(view)))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state with server time and remaining seconds"),
        (status = 404, description = "Session not found")
    )
)]
#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let view = state.session_service.get_session(claims.sub, id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    put,
    path = "/api/sessions/{id}/answers",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = SaveAnswerRequest,
    responses(
        (status = 200, description = "Answer saved"),
        (status = 400, description = "Question index out of range"),
        (status = 409, description = "Session is closed")
    )
)]
#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let saved = state.session_service.save_answer(claims.sub, id, payload).await?;
    Ok(Json(saved))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/run-code",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = RunCodeRequest,
    responses(
        (status = 200, description = "Per-case run report"),
        (status = 400, description = "Empty code or not a coding question"),
        (status = 503, description = "No execution backend configured")
    )
)]
#[axum::debug_handler]
pub async fn run_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RunCodeRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let report = state.session_service.run_code(claims.sub, id, payload).await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/proctoring",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = ProctoringEventRequest,
    responses(
        (status = 200, description = "Event recorded, or ignored for a closed session")
    )
)]
#[axum::debug_handler]
pub async fn record_proctoring(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProctoringEventRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .session_service
        .record_proctoring(claims.sub, id, payload)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/submit",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = SubmitSessionRequest,
    responses(
        (status = 200, description = "Session result; repeated submits return the same result"),
        (status = 400, description = "Body is not a valid submit request; nothing was closed")
    )
)]
#[axum::debug_handler]
pub async fn submit_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    // An empty body submits the stored answers as they are.
    let payload: SubmitSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SubmitSessionRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    payload.validate()?;
    let outcome = state
        .session_service
        .submit(claims.sub, id, payload.answers)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/result",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Stored result"),
        (status = 404, description = "Session not found or not yet submitted")
    )
)]
#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let result = state.session_service.get_result(claims.sub, id).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/my/assignments",
    responses((status = 200, description = "Assignments of the calling user"))
)]
#[axum::debug_handler]
pub async fn my_assignments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let assignments = state
        .assignment_service
        .list_for_user(claims.org, claims.sub)
        .await?;
    Ok(Json(assignments))
}
