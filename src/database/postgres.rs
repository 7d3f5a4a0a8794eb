use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::store::{
    AssessmentStore, AssignmentFilter, Finalization, FinalizeOutcome, ProctoringAppend,
    ResultFilter, SessionCreation,
};
use crate::error::{Error, Result};
use crate::models::assignment::{AssignmentStatus, TestAssignment};
use crate::models::proctoring::{ProctoringCounters, ProctoringEvent};
use crate::models::question::{Difficulty, Question, QuestionKind, QuestionStatus};
use crate::models::result::{QuestionOutcome, TestResult};
use crate::models::session::{Answers, SessionStatus, SubmissionTrigger, TestSession};
use crate::models::test::Test;

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    test_id: Uuid,
    position: i32,
    kind: Json<QuestionKind>,
    question: String,
    correct_answer: String,
    difficulty: Difficulty,
    weightage: i32,
    status: QuestionStatus,
    created_at: DateTime<Utc>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            test_id: row.test_id,
            position: row.position,
            kind: row.kind.0,
            question: row.question,
            correct_answer: row.correct_answer,
            difficulty: row.difficulty,
            weightage: row.weightage,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    assignment_id: Uuid,
    test_id: Uuid,
    user_id: Uuid,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    deadline_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    time_spent_minutes: Option<i32>,
    score: Option<i32>,
    answers: Json<Answers>,
    tab_switches: i32,
    fullscreen_exits: i32,
    copy_paste_attempts: i32,
    devtools_opened: i32,
    proctoring_events: Json<Vec<ProctoringEvent>>,
    submitted_by: Option<SubmissionTrigger>,
}

impl From<SessionRow> for TestSession {
    fn from(row: SessionRow) -> Self {
        TestSession {
            id: row.id,
            assignment_id: row.assignment_id,
            test_id: row.test_id,
            user_id: row.user_id,
            status: row.status,
            started_at: row.started_at,
            deadline_at: row.deadline_at,
            completed_at: row.completed_at,
            time_spent_minutes: row.time_spent_minutes,
            score: row.score,
            answers: row.answers.0,
            proctoring: ProctoringCounters {
                tab_switches: row.tab_switches.max(0) as u32,
                fullscreen_exits: row.fullscreen_exits.max(0) as u32,
                copy_paste_attempts: row.copy_paste_attempts.max(0) as u32,
                devtools_opened: row.devtools_opened.max(0) as u32,
            },
            proctoring_events: row.proctoring_events.0,
            submitted_by: row.submitted_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct ResultRow {
    id: Uuid,
    session_id: Uuid,
    assignment_id: Uuid,
    test_id: Uuid,
    user_id: Uuid,
    score: i32,
    total_questions: i32,
    percentage: i32,
    passed: bool,
    time_spent_minutes: i32,
    detailed_results: Json<Vec<QuestionOutcome>>,
    created_at: DateTime<Utc>,
}

impl From<ResultRow> for TestResult {
    fn from(row: ResultRow) -> Self {
        TestResult {
            id: row.id,
            session_id: row.session_id,
            assignment_id: row.assignment_id,
            test_id: row.test_id,
            user_id: row.user_id,
            score: row.score,
            total_questions: row.total_questions,
            percentage: row.percentage,
            passed: row.passed,
            time_spent_minutes: row.time_spent_minutes,
            detailed_results: row.detailed_results.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn session_exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM test_sessions WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl AssessmentStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_test(&self, test: &Test) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tests (
                id, organization_id, title, domain, level, duration_minutes,
                passing_score, project_id, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(test.id)
        .bind(test.organization_id)
        .bind(&test.title)
        .bind(&test.domain)
        .bind(&test.level)
        .bind(test.duration_minutes)
        .bind(test.passing_score)
        .bind(test.project_id)
        .bind(test.created_by)
        .bind(test.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_test(&self, id: Uuid) -> Result<Option<Test>> {
        let test = sqlx::query_as::<_, Test>(r#"SELECT * FROM tests WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(test)
    }

    async fn list_tests(&self, organization_id: Uuid) -> Result<Vec<Test>> {
        let tests = sqlx::query_as::<_, Test>(
            r#"SELECT * FROM tests WHERE organization_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tests)
    }

    async fn insert_question(&self, question: &Question) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO questions (
                id, test_id, position, kind, question, correct_answer,
                difficulty, weightage, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(question.id)
        .bind(question.test_id)
        .bind(question.position)
        .bind(Json(&question.kind))
        .bind(&question.question)
        .bind(&question.correct_answer)
        .bind(question.difficulty)
        .bind(question.weightage)
        .bind(question.status)
        .bind(question.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(r#"SELECT * FROM questions WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Question::from))
    }

    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT * FROM questions WHERE test_id = $1 ORDER BY position ASC"#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn update_question_status(&self, id: Uuid, status: QuestionStatus) -> Result<Question> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"UPDATE questions SET status = $2 WHERE id = $1 RETURNING *"#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn insert_assignment(&self, assignment: &TestAssignment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO test_assignments (
                id, organization_id, test_id, user_id, assigned_by, status,
                due_date, max_attempts, attempts_used, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.organization_id)
        .bind(assignment.test_id)
        .bind(assignment.user_id)
        .bind(assignment.assigned_by)
        .bind(assignment.status)
        .bind(assignment.due_date)
        .bind(assignment.max_attempts)
        .bind(assignment.attempts_used)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<TestAssignment>> {
        let row = sqlx::query_as::<_, TestAssignment>(
            r#"SELECT * FROM test_assignments WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_latest_assignment(
        &self,
        user_id: Uuid,
        test_id: Uuid,
    ) -> Result<Option<TestAssignment>> {
        let row = sqlx::query_as::<_, TestAssignment>(
            r#"
            SELECT * FROM test_assignments
            WHERE user_id = $1 AND test_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> Result<Vec<TestAssignment>> {
        let rows = sqlx::query_as::<_, TestAssignment>(
            r#"
            SELECT * FROM test_assignments
            WHERE ($1::uuid IS NULL OR organization_id = $1)
              AND ($2::uuid IS NULL OR test_id = $2)
              AND ($3::uuid IS NULL OR user_id = $3)
              AND ($4::assignment_status IS NULL OR status = $4)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.organization_id)
        .bind(filter.test_id)
        .bind(filter.user_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_overdue_assignments(&self, now: DateTime<Utc>) -> Result<u64> {
        let done = sqlx::query(
            r#"
            UPDATE test_assignments
            SET status = 'overdue', updated_at = $1
            WHERE status = 'assigned' AND due_date IS NOT NULL AND due_date < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn create_session(&self, session: &TestSession) -> Result<SessionCreation> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO test_sessions (
                id, assignment_id, test_id, user_id, status, started_at, deadline_at, answers
            ) VALUES ($1, $2, $3, $4, 'in_progress', $5, $6, $7)
            ON CONFLICT (assignment_id) WHERE status = 'in_progress' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.assignment_id)
        .bind(session.test_id)
        .bind(session.user_id)
        .bind(session.started_at)
        .bind(session.deadline_at)
        .bind(Json(&session.answers))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = inserted else {
            let existing = sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT * FROM test_sessions
                WHERE assignment_id = $1 AND status = 'in_progress'
                "#,
            )
            .bind(session.assignment_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(SessionCreation::Existing(existing.into()));
        };

        sqlx::query(
            r#"UPDATE test_assignments SET status = 'started', updated_at = $2 WHERE id = $1"#,
        )
        .bind(session.assignment_id)
        .bind(session.started_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(SessionCreation::Created(row.into()))
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<TestSession>> {
        let row = sqlx::query_as::<_, SessionRow>(r#"SELECT * FROM test_sessions WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(TestSession::from))
    }

    async fn save_answer(
        &self,
        id: Uuid,
        question_index: u32,
        answer: &str,
    ) -> Result<Option<TestSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE test_sessions
            SET answers = jsonb_set(answers, ARRAY[$2::text], to_jsonb($3::text), true)
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(question_index.to_string())
        .bind(answer)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into())),
            None if self.session_exists(id).await? => Ok(None),
            None => Err(Error::NotFound("Session not found".to_string())),
        }
    }

    async fn append_proctoring_event(
        &self,
        id: Uuid,
        event: &ProctoringEvent,
    ) -> Result<ProctoringAppend> {
        let mut delta = ProctoringCounters::default();
        delta.record(event.event_type);

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE test_sessions
            SET tab_switches = tab_switches + $2,
                fullscreen_exits = fullscreen_exits + $3,
                copy_paste_attempts = copy_paste_attempts + $4,
                devtools_opened = devtools_opened + $5,
                proctoring_events = proctoring_events || jsonb_build_array($6::jsonb)
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(delta.tab_switches as i32)
        .bind(delta.fullscreen_exits as i32)
        .bind(delta.copy_paste_attempts as i32)
        .bind(delta.devtools_opened as i32)
        .bind(Json(event))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(ProctoringAppend::Recorded(row.into()));
        }
        let session = self
            .get_session(id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        Ok(ProctoringAppend::Closed(session))
    }

    async fn list_expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<TestSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"SELECT * FROM test_sessions WHERE status = 'in_progress' AND deadline_at <= $1"#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TestSession::from).collect())
    }

    async fn list_sessions_for_test(&self, test_id: Uuid) -> Result<Vec<TestSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"SELECT * FROM test_sessions WHERE test_id = $1 ORDER BY started_at ASC"#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TestSession::from).collect())
    }

    async fn finalize_session(&self, finalization: Finalization) -> Result<FinalizeOutcome> {
        if finalization.status == SessionStatus::InProgress {
            return Err(Error::Internal("Cannot finalize into in_progress".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, SessionRow>(
            r#"SELECT * FROM test_sessions WHERE id = $1 FOR UPDATE"#,
        )
        .bind(finalization.session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        if current.status.is_terminal() {
            let result = sqlx::query_as::<_, ResultRow>(
                r#"SELECT * FROM test_results WHERE session_id = $1"#,
            )
            .bind(finalization.session_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "Session {} is closed but has no result",
                    finalization.session_id
                ))
            })?;
            tx.commit().await?;
            return Ok(FinalizeOutcome::AlreadyFinalized {
                session: current.into(),
                result: result.into(),
            });
        }

        let result = &finalization.result;
        let session = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE test_sessions
            SET status = $2, completed_at = $3, time_spent_minutes = $4,
                score = $5, answers = $6, submitted_by = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(finalization.session_id)
        .bind(finalization.status)
        .bind(finalization.completed_at)
        .bind(finalization.time_spent_minutes)
        .bind(result.score)
        .bind(Json(&finalization.answers))
        .bind(finalization.submitted_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE test_assignments
            SET status = CASE
                    WHEN $2 OR attempts_used + 1 >= max_attempts THEN $3
                    ELSE $4
                END,
                attempts_used = attempts_used + 1,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(session.assignment_id)
        .bind(result.passed)
        .bind(AssignmentStatus::Completed)
        .bind(AssignmentStatus::Assigned)
        .bind(finalization.completed_at)
        .execute(&mut *tx)
        .await?;

        let stored = sqlx::query_as::<_, ResultRow>(
            r#"
            INSERT INTO test_results (
                id, session_id, assignment_id, test_id, user_id, score, total_questions,
                percentage, passed, time_spent_minutes, detailed_results, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(result.id)
        .bind(result.session_id)
        .bind(result.assignment_id)
        .bind(result.test_id)
        .bind(result.user_id)
        .bind(result.score)
        .bind(result.total_questions)
        .bind(result.percentage)
        .bind(result.passed)
        .bind(result.time_spent_minutes)
        .bind(Json(&result.detailed_results))
        .bind(result.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FinalizeOutcome::Finalized {
            session: session.into(),
            result: stored.into(),
        })
    }

    async fn get_result_by_session(&self, session_id: Uuid) -> Result<Option<TestResult>> {
        let row = sqlx::query_as::<_, ResultRow>(
            r#"SELECT * FROM test_results WHERE session_id = $1"#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(TestResult::from))
    }

    async fn list_results(&self, filter: &ResultFilter) -> Result<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT r.* FROM test_results r
            JOIN tests t ON t.id = r.test_id
            WHERE ($1::uuid IS NULL OR t.organization_id = $1)
              AND ($2::uuid IS NULL OR r.test_id = $2)
              AND ($3::uuid IS NULL OR r.user_id = $3)
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(filter.organization_id)
        .bind(filter.test_id)
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TestResult::from).collect())
    }
}
