use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::database::store::{
    AssessmentStore, Finalization, ProctoringAppend, SessionCreation,
};
use crate::dto::session_dto::{
    ProctoringEventRequest, ProctoringResponse, RunCodeRequest, SaveAnswerRequest,
    SaveAnswerResponse, SessionView, SubmitResponse,
};
use crate::error::{Error, Result};
use crate::models::assignment::AssignmentStatus;
use crate::models::proctoring::ProctoringEvent;
use crate::models::question::Question;
use crate::models::result::TestResult;
use crate::models::session::{Answers, SessionStatus, SubmissionTrigger, TestSession};
use crate::models::test::Test;
use crate::services::code_runner::{CodeRunner, RunReport};
use crate::services::grading_service::{time_spent_minutes, GradingService};
use crate::services::proctoring_service::ProctoringMonitor;
use crate::services::question_renderer::{render, served_questions};
use crate::services::session_clock::SessionClock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: usize,
    pub failed: usize,
    pub overdue_assignments: u64,
}

/// Candidate-side lifecycle of a test session: start, answer, proctor, run code,
/// submit. Every path that closes a session goes through [`SessionService::finalize`].
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn AssessmentStore>,
    monitor: ProctoringMonitor,
    runner: CodeRunner,
    require_approved: bool,
}

impl SessionService {
    pub fn new(store: Arc<dyn AssessmentStore>, config: &Config, runner: CodeRunner) -> Self {
        Self {
            store,
            monitor: ProctoringMonitor::new(config.proctoring.clone()),
            runner,
            require_approved: config.require_approved_questions,
        }
    }

    /// Returns the session view and whether a new session was created. An in-progress
    /// session whose deadline has passed is closed first and the assignment re-checked.
    pub async fn start_session(&self, user_id: Uuid, test_id: Uuid) -> Result<(SessionView, bool)> {
        let test = self.load_test(test_id).await?;

        let mut creation = self.open_session(&test, user_id).await?;
        if let SessionCreation::Existing(stale) = &creation {
            if is_expired(stale, Utc::now()) {
                tracing::info!(session_id = %stale.id, "Closing expired session before restart");
                self.finalize(stale.clone(), SubmissionTrigger::Timer, None).await?;
                creation = self.open_session(&test, user_id).await?;
            }
        }

        let (session, created) = match creation {
            SessionCreation::Created(s) => {
                tracing::info!(
                    session_id = %s.id,
                    user_id = %user_id,
                    test_id = %test_id,
                    deadline_at = %s.deadline_at,
                    "Test session started"
                );
                (s, true)
            }
            SessionCreation::Existing(s) => {
                tracing::info!(session_id = %s.id, "Resuming in-progress session");
                (s, false)
            }
        };

        let questions = self.questions_for(&test).await?;
        Ok((self.view(&test, &session, &questions, Utc::now()), created))
    }

    async fn open_session(&self, test: &Test, user_id: Uuid) -> Result<SessionCreation> {
        let assignment = self
            .store
            .find_latest_assignment(user_id, test.id)
            .await?
            .ok_or_else(|| Error::NotFound("No assignment found for this test".to_string()))?;

        let now = Utc::now();
        match assignment.status {
            AssignmentStatus::Completed => return Err(Error::AlreadyCompleted),
            AssignmentStatus::Overdue => return Err(Error::AssignmentOverdue),
            AssignmentStatus::Assigned => {
                if assignment.attempts_exhausted() {
                    return Err(Error::AlreadyCompleted);
                }
                if assignment.is_past_due(now) {
                    return Err(Error::AssignmentOverdue);
                }
            }
            AssignmentStatus::Started => {}
        }

        let clock = SessionClock::start(now, test.duration_minutes);
        let session = TestSession {
            id: Uuid::new_v4(),
            assignment_id: assignment.id,
            test_id: test.id,
            user_id,
            status: SessionStatus::InProgress,
            started_at: clock.started_at,
            deadline_at: clock.deadline_at,
            completed_at: None,
            time_spent_minutes: None,
            score: None,
            answers: Answers::new(),
            proctoring: Default::default(),
            proctoring_events: Vec::new(),
            submitted_by: None,
        };
        self.store.create_session(&session).await
    }

    pub async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionView> {
        let mut session = self.owned_session(user_id, session_id).await?;
        let test = self.load_test(session.test_id).await?;
        let now = Utc::now();

        if is_expired(&session, now) {
            self.finalize(session, SubmissionTrigger::Timer, None).await?;
            session = self.owned_session(user_id, session_id).await?;
        }

        let questions = self.questions_for(&test).await?;
        Ok(self.view(&test, &session, &questions, now))
    }

    pub async fn save_answer(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        req: SaveAnswerRequest,
    ) -> Result<SaveAnswerResponse> {
        let session = self.owned_session(user_id, session_id).await?;
        let now = Utc::now();
        let clock = SessionClock::from_bounds(session.started_at, session.deadline_at);

        if !session.is_active() {
            return Err(Error::Conflict("Session is no longer in progress".to_string()));
        }
        if clock.is_expired(now) {
            self.finalize(session, SubmissionTrigger::Timer, None).await?;
            return Err(Error::Conflict("Session time is over".to_string()));
        }

        let test = self.load_test(session.test_id).await?;
        let questions = self.questions_for(&test).await?;
        if req.question_index as usize >= questions.len() {
            return Err(Error::BadRequest(format!(
                "question_index {} is out of range (0..{})",
                req.question_index,
                questions.len()
            )));
        }

        let updated = self
            .store
            .save_answer(session_id, req.question_index, &req.answer)
            .await?
            .ok_or_else(|| Error::Conflict("Session is no longer in progress".to_string()))?;

        Ok(SaveAnswerResponse {
            saved: true,
            question_index: req.question_index,
            answered_count: updated.answers.values().filter(|a| !a.is_empty()).count(),
            seconds_remaining: clock.seconds_remaining(now),
        })
    }

    /// Code runs never touch session or result data. Empty code is refused before
    /// the store is consulted.
    pub async fn run_code(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        req: RunCodeRequest,
    ) -> Result<RunReport> {
        CodeRunner::ensure_runnable(&req.code)?;

        let session = self.owned_session(user_id, session_id).await?;
        if !session.is_active() {
            return Err(Error::Conflict("Session is no longer in progress".to_string()));
        }
        let test = self.load_test(session.test_id).await?;
        let questions = self.questions_for(&test).await?;
        let question = questions.get(req.question_index as usize).ok_or_else(|| {
            Error::BadRequest(format!("question_index {} is out of range", req.question_index))
        })?;

        let report = self.runner.run(question, &req.code).await?;
        tracing::debug!(
            session_id = %session_id,
            question_index = req.question_index,
            mode = ?report.mode,
            passed = report.passed,
            total = report.total,
            "Code run"
        );
        Ok(report)
    }

    pub async fn record_proctoring(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        req: ProctoringEventRequest,
    ) -> Result<ProctoringResponse> {
        let session = self.owned_session(user_id, session_id).await?;
        if is_expired(&session, Utc::now()) {
            self.finalize(session, SubmissionTrigger::Timer, None).await?;
            let closed = self.owned_session(user_id, session_id).await?;
            return Ok(ProctoringResponse {
                accepted: false,
                event: None,
                proctoring: self.monitor.snapshot(&closed.proctoring),
                auto_submitted: false,
                session_status: closed.status,
            });
        }

        let description = req
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| req.event_type.default_description().to_string());
        let event = ProctoringEvent {
            event_type: req.event_type,
            severity: req.event_type.severity(),
            description,
            timestamp: Utc::now(),
        };

        let session = match self.store.append_proctoring_event(session_id, &event).await? {
            ProctoringAppend::Closed(session) => {
                return Ok(ProctoringResponse {
                    accepted: false,
                    event: None,
                    proctoring: self.monitor.snapshot(&session.proctoring),
                    auto_submitted: false,
                    session_status: session.status,
                });
            }
            ProctoringAppend::Recorded(session) => session,
        };

        let snapshot = self.monitor.snapshot(&session.proctoring);
        tracing::info!(
            session_id = %session_id,
            event_type = ?event.event_type,
            severity = ?event.severity,
            security_score = snapshot.security_score,
            blocked = snapshot.blocked,
            "Proctoring event recorded"
        );

        let mut auto_submitted = false;
        let mut status = session.status;
        if self.monitor.should_auto_submit(&session.proctoring) {
            tracing::warn!(
                session_id = %session_id,
                "Proctoring limits exceeded, submitting session"
            );
            let outcome = self.finalize(session, SubmissionTrigger::Proctoring, None).await?;
            auto_submitted = !outcome.already_submitted;
            status = outcome.session_status;
        }

        Ok(ProctoringResponse {
            accepted: true,
            event: Some(event),
            proctoring: snapshot,
            auto_submitted,
            session_status: status,
        })
    }

    pub async fn submit(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        answers: Option<Answers>,
    ) -> Result<SubmitResponse> {
        let session = self.owned_session(user_id, session_id).await?;
        self.finalize(session, SubmissionTrigger::Manual, answers).await
    }

    pub async fn get_result(&self, user_id: Uuid, session_id: Uuid) -> Result<TestResult> {
        let session = self.owned_session(user_id, session_id).await?;
        self.store
            .get_result_by_session(session.id)
            .await?
            .ok_or_else(|| Error::NotFound("Session has not been submitted yet".to_string()))
    }

    /// The single closing path shared by manual submit, the timer and proctoring.
    /// Grading happens here; the store decides atomically whether this call wins.
    pub async fn finalize(
        &self,
        session: TestSession,
        trigger: SubmissionTrigger,
        extra_answers: Option<Answers>,
    ) -> Result<SubmitResponse> {
        self.finalize_at(session, trigger, extra_answers, Utc::now()).await
    }

    async fn finalize_at(
        &self,
        session: TestSession,
        trigger: SubmissionTrigger,
        extra_answers: Option<Answers>,
        now: DateTime<Utc>,
    ) -> Result<SubmitResponse> {
        if session.status.is_terminal() {
            let result = self
                .store
                .get_result_by_session(session.id)
                .await?
                .ok_or_else(|| {
                    Error::Internal(format!("Session {} is closed but has no result", session.id))
                })?;
            return Ok(SubmitResponse {
                already_submitted: true,
                session_status: session.status,
                submitted_by: session.submitted_by,
                result,
            });
        }

        let test = self.load_test(session.test_id).await?;
        let questions = self.questions_for(&test).await?;

        let clock = SessionClock::from_bounds(session.started_at, session.deadline_at);
        let status = clock.closing_status(now, trigger);

        let mut answers = session.answers.clone();
        match extra_answers {
            Some(extra) if status == SessionStatus::TimedOut => {
                tracing::warn!(
                    session_id = %session.id,
                    ignored = extra.len(),
                    "Ignoring answers submitted after the deadline"
                );
            }
            Some(extra) => answers.extend(extra),
            None => {}
        }
        answers.retain(|idx, _| (*idx as usize) < questions.len());

        let closed_at = clock.effective_close_time(now, trigger);
        let time_spent =
            time_spent_minutes(test.duration_minutes, clock.seconds_remaining(closed_at));

        let summary = GradingService::grade(&questions, &answers, test.passing_score);
        let result = TestResult {
            id: Uuid::new_v4(),
            session_id: session.id,
            assignment_id: session.assignment_id,
            test_id: session.test_id,
            user_id: session.user_id,
            score: summary.correct,
            total_questions: summary.total,
            percentage: summary.percentage,
            passed: summary.passed,
            time_spent_minutes: time_spent,
            detailed_results: summary.outcomes,
            created_at: closed_at,
        };

        let (session, result, already_submitted) = self
            .store
            .finalize_session(Finalization {
                session_id: session.id,
                status,
                completed_at: closed_at,
                time_spent_minutes: time_spent,
                answers,
                submitted_by: trigger,
                result,
            })
            .await?
            .into_parts();

        if !already_submitted {
            tracing::info!(
                session_id = %session.id,
                trigger = ?trigger,
                status = ?session.status,
                percentage = result.percentage,
                passed = result.passed,
                "Test session finalized"
            );
        }

        Ok(SubmitResponse {
            already_submitted,
            session_status: session.status,
            submitted_by: session.submitted_by,
            result,
        })
    }

    /// Closes every session past its deadline and marks late assignments overdue.
    /// A failure on one session is logged and does not stop the rest.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for session in self.store.list_expired_sessions(now).await? {
            let session_id = session.id;
            match self.finalize_at(session, SubmissionTrigger::Timer, None, now).await {
                Ok(outcome) if !outcome.already_submitted => report.timed_out += 1,
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        session_id = %session_id,
                        error = ?e,
                        "Failed to time out session"
                    );
                }
            }
        }
        report.overdue_assignments = self.store.mark_overdue_assignments(now).await?;
        Ok(report)
    }

    async fn load_test(&self, test_id: Uuid) -> Result<Test> {
        self.store
            .get_test(test_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".to_string()))
    }

    async fn questions_for(&self, test: &Test) -> Result<Vec<Question>> {
        let all = self.store.list_questions(test.id).await?;
        Ok(served_questions(&all, self.require_approved))
    }

    /// Sessions of other users look the same as missing ones.
    async fn owned_session(&self, user_id: Uuid, session_id: Uuid) -> Result<TestSession> {
        match self.store.get_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(Error::NotFound("Session not found".to_string())),
        }
    }

    fn view(
        &self,
        test: &Test,
        session: &TestSession,
        questions: &[Question],
        now: DateTime<Utc>,
    ) -> SessionView {
        let clock = SessionClock::from_bounds(session.started_at, session.deadline_at);
        let active = session.is_active();
        SessionView {
            session_id: session.id,
            assignment_id: session.assignment_id,
            test_id: session.test_id,
            title: test.title.clone(),
            status: session.status,
            started_at: session.started_at,
            deadline_at: session.deadline_at,
            server_time: now,
            seconds_remaining: if active { clock.seconds_remaining(now) } else { 0 },
            duration_minutes: test.duration_minutes,
            completed_at: session.completed_at,
            total_questions: questions.len(),
            answers: session.answers.clone(),
            proctoring: self.monitor.snapshot(&session.proctoring),
            questions: if active { render(questions) } else { Vec::new() },
        }
    }
}

fn is_expired(session: &TestSession, now: DateTime<Utc>) -> bool {
    session.is_active()
        && SessionClock::from_bounds(session.started_at, session.deadline_at).is_expired(now)
}
