use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::proctoring::{ProctoringEvent, ProctoringEventType, ProctoringSnapshot};
use crate::models::result::TestResult;
use crate::models::session::{Answers, SessionStatus, SubmissionTrigger};
use crate::services::question_renderer::QuestionView;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSessionRequest {
    pub test_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaveAnswerRequest {
    pub question_index: u32,
    /// An empty string clears the answer.
    #[validate(length(max = 20000))]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RunCodeRequest {
    pub question_index: u32,
    #[validate(length(max = 100000))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProctoringEventRequest {
    pub event_type: ProctoringEventType,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitSessionRequest {
    /// Answers merged over the stored ones before grading, keyed by question index.
    #[serde(default)]
    pub answers: Option<BTreeMap<u32, String>>,
}

/// Full state of a session as the candidate sees it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub assignment_id: Uuid,
    pub test_id: Uuid,
    pub title: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
    pub server_time: DateTime<Utc>,
    pub seconds_remaining: i64,
    pub duration_minutes: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_questions: usize,
    pub answers: Answers,
    pub proctoring: ProctoringSnapshot,
    /// Empty once the session is closed.
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveAnswerResponse {
    pub saved: bool,
    pub question_index: u32,
    pub answered_count: usize,
    pub seconds_remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProctoringResponse {
    /// `false` when the session was already closed and nothing was recorded.
    pub accepted: bool,
    pub event: Option<ProctoringEvent>,
    pub proctoring: ProctoringSnapshot,
    pub auto_submitted: bool,
    pub session_status: SessionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub already_submitted: bool,
    pub session_status: SessionStatus,
    pub submitted_by: Option<SubmissionTrigger>,
    pub result: TestResult,
}
