use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::proctoring::{ProctoringCounters, ProctoringEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    TimedOut,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

/// What closed a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "submission_trigger", rename_all = "snake_case")]
pub enum SubmissionTrigger {
    Manual,
    Timer,
    Proctoring,
}

/// Answers keyed by question position.
pub type Answers = BTreeMap<u32, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent_minutes: Option<i32>,
    pub score: Option<i32>,
    pub answers: Answers,
    pub proctoring: ProctoringCounters,
    pub proctoring_events: Vec<ProctoringEvent>,
    pub submitted_by: Option<SubmissionTrigger>,
}

impl TestSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::InProgress
    }
}
