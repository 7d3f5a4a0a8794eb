use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_index: u32,
    pub question_id: Uuid,
    pub kind: String,
    pub given_answer: Option<String>,
    pub correct_answer: String,
    pub correct: bool,
    pub weightage: i32,
}

/// Immutable record written once when a session is finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub assignment_id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: i32,
    pub passed: bool,
    pub time_spent_minutes: i32,
    pub detailed_results: Vec<QuestionOutcome>,
    pub created_at: DateTime<Utc>,
}
