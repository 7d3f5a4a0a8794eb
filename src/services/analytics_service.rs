use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::ProctoringPolicy;
use crate::database::store::{AssessmentStore, ResultFilter};
use crate::dto::admin_dto::{ResultQuery, TestAnalytics};
use crate::error::{Error, Result};
use crate::models::result::TestResult;
use crate::models::session::{SessionStatus, TestSession};
use crate::models::test::Test;
use crate::services::proctoring_service::ProctoringMonitor;

/// Read-only reporting over results and sessions.
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn AssessmentStore>,
    monitor: ProctoringMonitor,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn AssessmentStore>, policy: ProctoringPolicy) -> Self {
        Self {
            store,
            monitor: ProctoringMonitor::new(policy),
        }
    }

    pub async fn list_results(
        &self,
        organization_id: Uuid,
        query: ResultQuery,
    ) -> Result<Vec<TestResult>> {
        self.store
            .list_results(&ResultFilter {
                organization_id: Some(organization_id),
                test_id: query.test_id,
                user_id: query.user_id,
            })
            .await
    }

    /// Results plus the tests they belong to, for spreadsheet export.
    pub async fn results_with_tests(
        &self,
        organization_id: Uuid,
        query: ResultQuery,
    ) -> Result<(Vec<TestResult>, HashMap<Uuid, Test>)> {
        let results = self.list_results(organization_id, query).await?;
        let tests = self
            .store
            .list_tests(organization_id)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        Ok((results, tests))
    }

    pub async fn test_analytics(
        &self,
        organization_id: Uuid,
        test_id: Uuid,
    ) -> Result<TestAnalytics> {
        match self.store.get_test(test_id).await? {
            Some(test) if test.organization_id == organization_id => {}
            _ => return Err(Error::NotFound("Test not found".to_string())),
        }
        let sessions = self.store.list_sessions_for_test(test_id).await?;
        let results = self
            .store
            .list_results(&ResultFilter {
                organization_id: Some(organization_id),
                test_id: Some(test_id),
                user_id: None,
            })
            .await?;
        Ok(self.summarize(test_id, &sessions, &results))
    }

    pub fn summarize(
        &self,
        test_id: Uuid,
        sessions: &[TestSession],
        results: &[TestResult],
    ) -> TestAnalytics {
        let count_status =
            |status: SessionStatus| sessions.iter().filter(|s| s.status == status).count();
        let passed = results.iter().filter(|r| r.passed).count();

        TestAnalytics {
            test_id,
            sessions_started: sessions.len(),
            sessions_in_progress: count_status(SessionStatus::InProgress),
            sessions_completed: count_status(SessionStatus::Completed),
            sessions_timed_out: count_status(SessionStatus::TimedOut),
            passed,
            pass_rate: ratio(passed, results.len()),
            average_percentage: mean(results.iter().map(|r| r.percentage as f64)),
            average_time_spent_minutes: mean(results.iter().map(|r| r.time_spent_minutes as f64)),
            average_security_score: mean(
                sessions
                    .iter()
                    .map(|s| ProctoringMonitor::security_score(&s.proctoring) as f64),
            ),
            blocked_sessions: sessions
                .iter()
                .filter(|s| self.monitor.is_blocked(&s.proctoring))
                .count(),
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        round2(sum / n as f64)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::proctoring::ProctoringCounters;
    use crate::models::session::Answers;
    use chrono::Utc;

    fn session(status: SessionStatus, devtools: u32) -> TestSession {
        let now = Utc::now();
        TestSession {
            id: Uuid::new_v4(),
            assignment_id: Uuid::new_v4(),
            test_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            status,
            started_at: now,
            deadline_at: now,
            completed_at: None,
            time_spent_minutes: None,
            score: None,
            answers: Answers::new(),
            proctoring: ProctoringCounters {
                devtools_opened: devtools,
                ..Default::default()
            },
            proctoring_events: Vec::new(),
            submitted_by: None,
        }
    }

    fn result(percentage: i32, passed: bool, minutes: i32) -> TestResult {
        TestResult {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            assignment_id: Uuid::new_v4(),
            test_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            score: 0,
            total_questions: 10,
            percentage,
            passed,
            time_spent_minutes: minutes,
            detailed_results: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_aggregates_sessions_and_results() {
        let svc = AnalyticsService::new(Arc::new(MemoryStore::new()), ProctoringPolicy::default());
        let sessions = vec![
            session(SessionStatus::Completed, 0),
            session(SessionStatus::TimedOut, 2),
            session(SessionStatus::InProgress, 0),
        ];
        let results = vec![result(80, true, 20), result(40, false, 30)];
        let a = svc.summarize(Uuid::nil(), &sessions, &results);

        assert_eq!(a.sessions_started, 3);
        assert_eq!(a.sessions_completed, 1);
        assert_eq!(a.sessions_timed_out, 1);
        assert_eq!(a.sessions_in_progress, 1);
        assert_eq!(a.passed, 1);
        assert_eq!(a.pass_rate, 50.0);
        assert_eq!(a.average_percentage, 60.0);
        assert_eq!(a.average_time_spent_minutes, 25.0);
        assert_eq!(a.average_security_score, 83.33);
        assert_eq!(a.blocked_sessions, 1);
    }

    #[test]
    fn empty_test_has_zeroed_analytics() {
        let svc = AnalyticsService::new(Arc::new(MemoryStore::new()), ProctoringPolicy::default());
        let a = svc.summarize(Uuid::nil(), &[], &[]);
        assert_eq!(a.pass_rate, 0.0);
        assert_eq!(a.average_security_score, 0.0);
    }
}
