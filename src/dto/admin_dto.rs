use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::assignment::AssignmentStatus;
use crate::models::question::{Difficulty, QuestionKind, QuestionStatus};
use crate::models::test::Test;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTestRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub domain: String,
    #[validate(length(min = 1, max = 50))]
    pub level: String,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i32,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    pub project_id: Option<Uuid>,
}

/// `kind` is flattened, so the body carries `"type": "mcq" | "coding" | ...`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[validate(length(min = 1, max = 10000))]
    pub question: String,
    #[validate(length(max = 10000))]
    pub correct_answer: String,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 100))]
    pub weightage: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReviewQuestionRequest {
    pub status: QuestionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAssignmentsRequest {
    pub test_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub user_ids: Vec<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentQuery {
    pub test_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultQuery {
    pub test_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    #[serde(flatten)]
    pub test: Test,
    pub total_questions: usize,
    pub approved_questions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestAnalytics {
    pub test_id: Uuid,
    pub sessions_started: usize,
    pub sessions_in_progress: usize,
    pub sessions_completed: usize,
    pub sessions_timed_out: usize,
    pub passed: usize,
    pub pass_rate: f64,
    pub average_percentage: f64,
    pub average_time_spent_minutes: f64,
    pub average_security_score: f64,
    pub blocked_sessions: usize,
}
