use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{
    AssessmentStore, AssignmentFilter, Finalization, FinalizeOutcome, ProctoringAppend,
    ResultFilter, SessionCreation,
};
use crate::error::{Error, Result};
use crate::models::assignment::{AssignmentStatus, TestAssignment};
use crate::models::proctoring::ProctoringEvent;
use crate::models::question::{Question, QuestionStatus};
use crate::models::result::TestResult;
use crate::models::session::{SessionStatus, TestSession};
use crate::models::test::Test;

#[derive(Default)]
struct Tables {
    tests: HashMap<Uuid, Test>,
    questions: HashMap<Uuid, Question>,
    assignments: HashMap<Uuid, TestAssignment>,
    sessions: HashMap<Uuid, TestSession>,
    results: HashMap<Uuid, TestResult>,
}

/// Process-local store. All operations run under one lock, which gives the same
/// atomicity the PostgreSQL store gets from transactions.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn test_in_org(tables: &Tables, test_id: Uuid, organization_id: Option<Uuid>) -> bool {
    match organization_id {
        None => true,
        Some(org) => tables
            .tests
            .get(&test_id)
            .map(|t| t.organization_id == org)
            .unwrap_or(false),
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_test(&self, test: &Test) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.tests.insert(test.id, test.clone());
        Ok(())
    }

    async fn get_test(&self, id: Uuid) -> Result<Option<Test>> {
        Ok(self.tables.lock().await.tests.get(&id).cloned())
    }

    async fn list_tests(&self, organization_id: Uuid) -> Result<Vec<Test>> {
        let tables = self.tables.lock().await;
        let mut tests: Vec<Test> = tables
            .tests
            .values()
            .filter(|t| t.organization_id == organization_id)
            .cloned()
            .collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tests)
    }

    async fn insert_question(&self, question: &Question) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.tests.contains_key(&question.test_id) {
            return Err(Error::NotFound("Test not found".to_string()));
        }
        tables.questions.insert(question.id, question.clone());
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        Ok(self.tables.lock().await.questions.get(&id).cloned())
    }

    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let tables = self.tables.lock().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.position);
        Ok(questions)
    }

    async fn update_question_status(&self, id: Uuid, status: QuestionStatus) -> Result<Question> {
        let mut tables = self.tables.lock().await;
        let question = tables
            .questions
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;
        question.status = status;
        Ok(question.clone())
    }

    async fn insert_assignment(&self, assignment: &TestAssignment) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.tests.contains_key(&assignment.test_id) {
            return Err(Error::NotFound("Test not found".to_string()));
        }
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<TestAssignment>> {
        Ok(self.tables.lock().await.assignments.get(&id).cloned())
    }

    async fn find_latest_assignment(
        &self,
        user_id: Uuid,
        test_id: Uuid,
    ) -> Result<Option<TestAssignment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assignments
            .values()
            .filter(|a| a.user_id == user_id && a.test_id == test_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> Result<Vec<TestAssignment>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<TestAssignment> = tables
            .assignments
            .values()
            .filter(|a| filter.organization_id.map_or(true, |v| a.organization_id == v))
            .filter(|a| filter.test_id.map_or(true, |v| a.test_id == v))
            .filter(|a| filter.user_id.map_or(true, |v| a.user_id == v))
            .filter(|a| filter.status.map_or(true, |v| a.status == v))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn mark_overdue_assignments(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let mut changed = 0;
        for assignment in tables.assignments.values_mut() {
            if assignment.status == AssignmentStatus::Assigned && assignment.is_past_due(now) {
                assignment.status = AssignmentStatus::Overdue;
                assignment.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn create_session(&self, session: &TestSession) -> Result<SessionCreation> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .sessions
            .values()
            .find(|s| s.assignment_id == session.assignment_id && s.is_active())
        {
            return Ok(SessionCreation::Existing(existing.clone()));
        }
        let assignment = tables
            .assignments
            .get_mut(&session.assignment_id)
            .ok_or_else(|| Error::NotFound("Assignment not found".to_string()))?;
        assignment.status = AssignmentStatus::Started;
        assignment.updated_at = session.started_at;
        tables.sessions.insert(session.id, session.clone());
        Ok(SessionCreation::Created(session.clone()))
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<TestSession>> {
        Ok(self.tables.lock().await.sessions.get(&id).cloned())
    }

    async fn save_answer(
        &self,
        id: Uuid,
        question_index: u32,
        answer: &str,
    ) -> Result<Option<TestSession>> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        if !session.is_active() {
            return Ok(None);
        }
        session.answers.insert(question_index, answer.to_string());
        Ok(Some(session.clone()))
    }

    async fn append_proctoring_event(
        &self,
        id: Uuid,
        event: &ProctoringEvent,
    ) -> Result<ProctoringAppend> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        if !session.is_active() {
            return Ok(ProctoringAppend::Closed(session.clone()));
        }
        session.proctoring.record(event.event_type);
        session.proctoring_events.push(event.clone());
        Ok(ProctoringAppend::Recorded(session.clone()))
    }

    async fn list_expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<TestSession>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.is_active() && s.deadline_at <= now)
            .cloned()
            .collect())
    }

    async fn list_sessions_for_test(&self, test_id: Uuid) -> Result<Vec<TestSession>> {
        let tables = self.tables.lock().await;
        let mut sessions: Vec<TestSession> = tables
            .sessions
            .values()
            .filter(|s| s.test_id == test_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn finalize_session(&self, finalization: Finalization) -> Result<FinalizeOutcome> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get(&finalization.session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        if session.status.is_terminal() {
            let result = tables
                .results
                .values()
                .find(|r| r.session_id == session.id)
                .cloned()
                .ok_or_else(|| {
                    Error::Internal(format!("Session {} is closed but has no result", session.id))
                })?;
            return Ok(FinalizeOutcome::AlreadyFinalized { session, result });
        }
        if finalization.status == SessionStatus::InProgress {
            return Err(Error::Internal("Cannot finalize into in_progress".to_string()));
        }

        let assignment = tables
            .assignments
            .get_mut(&session.assignment_id)
            .ok_or_else(|| Error::NotFound("Assignment not found".to_string()))?;
        assignment.status = assignment.status_after_attempt(finalization.result.passed);
        assignment.attempts_used += 1;
        assignment.updated_at = finalization.completed_at;

        let session = {
            let stored = tables
                .sessions
                .get_mut(&finalization.session_id)
                .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
            stored.status = finalization.status;
            stored.completed_at = Some(finalization.completed_at);
            stored.time_spent_minutes = Some(finalization.time_spent_minutes);
            stored.score = Some(finalization.result.score);
            stored.answers = finalization.answers;
            stored.submitted_by = Some(finalization.submitted_by);
            stored.clone()
        };

        let result = finalization.result;
        tables.results.insert(result.id, result.clone());
        Ok(FinalizeOutcome::Finalized { session, result })
    }

    async fn get_result_by_session(&self, session_id: Uuid) -> Result<Option<TestResult>> {
        let tables = self.tables.lock().await;
        Ok(tables.results.values().find(|r| r.session_id == session_id).cloned())
    }

    async fn list_results(&self, filter: &ResultFilter) -> Result<Vec<TestResult>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<TestResult> = tables
            .results
            .values()
            .filter(|r| test_in_org(&tables, r.test_id, filter.organization_id))
            .filter(|r| filter.test_id.map_or(true, |v| r.test_id == v))
            .filter(|r| filter.user_id.map_or(true, |v| r.user_id == v))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
