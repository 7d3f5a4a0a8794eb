use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    pub position: i32,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub question: String,
    pub correct_answer: String,
    pub difficulty: Difficulty,
    pub weightage: i32,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
}

/// Closed set of question variants. Renderer and scoring dispatch match on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq {
        #[serde(default)]
        options: Vec<String>,
    },
    Coding {
        language: String,
        #[serde(default)]
        starter_code: Option<String>,
        #[serde(default)]
        execution: ExecutionPolicy,
    },
    FillBlank,
    Scenario,
    DirectQa,
}

impl QuestionKind {
    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::Mcq { .. } => "mcq",
            QuestionKind::Coding { .. } => "coding",
            QuestionKind::FillBlank => "fill_blank",
            QuestionKind::Scenario => "scenario",
            QuestionKind::DirectQa => "direct_qa",
        }
    }
}

/// How a coding question's "Run" button is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// No code is executed. Cases are shown with a heuristic verdict.
    Simulated {
        #[serde(default)]
        cases: Vec<CodeCase>,
    },
    /// Cases are executed by the configured execution backend.
    Sandboxed {
        #[serde(default)]
        cases: Vec<CodeCase>,
    },
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        ExecutionPolicy::Simulated { cases: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCase {
    pub input: String,
    pub expected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "question_difficulty", rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "question_status", rename_all = "snake_case")]
pub enum QuestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl QuestionStatus {
    /// Review transitions allowed from this status.
    pub fn can_transition_to(self, next: QuestionStatus) -> bool {
        use QuestionStatus::{Approved, Pending, Rejected};
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Rejected, Pending) | (Approved, Rejected)
        )
    }
}
