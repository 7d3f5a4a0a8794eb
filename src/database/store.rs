use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::assignment::{AssignmentStatus, TestAssignment};
use crate::models::proctoring::ProctoringEvent;
use crate::models::question::{Question, QuestionStatus};
use crate::models::result::TestResult;
use crate::models::session::{Answers, SessionStatus, SubmissionTrigger, TestSession};
use crate::models::test::Test;

#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub organization_id: Option<Uuid>,
    pub test_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub organization_id: Option<Uuid>,
    pub test_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum SessionCreation {
    Created(TestSession),
    /// An in-progress session already existed for the assignment.
    Existing(TestSession),
}

#[derive(Debug, Clone)]
pub enum ProctoringAppend {
    Recorded(TestSession),
    /// The session is terminal; nothing was written.
    Closed(TestSession),
}

/// Everything written when a session closes.
#[derive(Debug, Clone)]
pub struct Finalization {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub completed_at: DateTime<Utc>,
    pub time_spent_minutes: i32,
    pub answers: Answers,
    pub submitted_by: SubmissionTrigger,
    pub result: TestResult,
}

#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    Finalized { session: TestSession, result: TestResult },
    AlreadyFinalized { session: TestSession, result: TestResult },
}

impl FinalizeOutcome {
    pub fn into_parts(self) -> (TestSession, TestResult, bool) {
        match self {
            FinalizeOutcome::Finalized { session, result } => (session, result, false),
            FinalizeOutcome::AlreadyFinalized { session, result } => (session, result, true),
        }
    }
}

/// Persistence boundary. `finalize_session` must be atomic and idempotent per session id:
/// the session update, the assignment update and the result insert land together or not
/// at all, and a terminal session never receives a second result.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn insert_test(&self, test: &Test) -> Result<()>;
    async fn get_test(&self, id: Uuid) -> Result<Option<Test>>;
    async fn list_tests(&self, organization_id: Uuid) -> Result<Vec<Test>>;

    async fn insert_question(&self, question: &Question) -> Result<()>;
    async fn get_question(&self, id: Uuid) -> Result<Option<Question>>;
    /// Ordered by position.
    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<Question>>;
    async fn update_question_status(&self, id: Uuid, status: QuestionStatus) -> Result<Question>;

    async fn insert_assignment(&self, assignment: &TestAssignment) -> Result<()>;
    async fn get_assignment(&self, id: Uuid) -> Result<Option<TestAssignment>>;
    async fn find_latest_assignment(
        &self,
        user_id: Uuid,
        test_id: Uuid,
    ) -> Result<Option<TestAssignment>>;
    async fn list_assignments(&self, filter: &AssignmentFilter) -> Result<Vec<TestAssignment>>;
    /// Moves `assigned` assignments past their due date to `overdue`.
    async fn mark_overdue_assignments(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Inserts `session` and moves its assignment to `started`, unless an in-progress
    /// session already exists for the same assignment.
    async fn create_session(&self, session: &TestSession) -> Result<SessionCreation>;
    async fn get_session(&self, id: Uuid) -> Result<Option<TestSession>>;
    /// Upserts one answer of an in-progress session. Returns `None` when the session is
    /// no longer in progress.
    async fn save_answer(
        &self,
        id: Uuid,
        question_index: u32,
        answer: &str,
    ) -> Result<Option<TestSession>>;
    async fn append_proctoring_event(
        &self,
        id: Uuid,
        event: &ProctoringEvent,
    ) -> Result<ProctoringAppend>;
    async fn list_expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<TestSession>>;
    async fn list_sessions_for_test(&self, test_id: Uuid) -> Result<Vec<TestSession>>;

    async fn finalize_session(&self, finalization: Finalization) -> Result<FinalizeOutcome>;

    async fn get_result_by_session(&self, session_id: Uuid) -> Result<Option<TestResult>>;
    async fn list_results(&self, filter: &ResultFilter) -> Result<Vec<TestResult>>;
}
