use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Started,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAssignment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub assigned_by: Uuid,
    pub status: AssignmentStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub max_attempts: i32,
    pub attempts_used: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestAssignment {
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts_used >= self.max_attempts
    }

    /// Status after one more finished attempt.
    pub fn status_after_attempt(&self, passed: bool) -> AssignmentStatus {
        if passed || self.attempts_used + 1 >= self.max_attempts {
            AssignmentStatus::Completed
        } else {
            AssignmentStatus::Assigned
        }
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date.map(|due| due < now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(max_attempts: i32, attempts_used: i32) -> TestAssignment {
        let now = Utc::now();
        TestAssignment {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            test_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            assigned_by: Uuid::new_v4(),
            status: AssignmentStatus::Started,
            due_date: None,
            max_attempts,
            attempts_used,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn passing_completes_the_assignment() {
        assert_eq!(assignment(3, 0).status_after_attempt(true), AssignmentStatus::Completed);
    }

    #[test]
    fn failing_reopens_until_attempts_run_out() {
        assert_eq!(assignment(3, 0).status_after_attempt(false), AssignmentStatus::Assigned);
        assert_eq!(assignment(3, 2).status_after_attempt(false), AssignmentStatus::Completed);
        assert_eq!(assignment(1, 0).status_after_attempt(false), AssignmentStatus::Completed);
    }

    #[test]
    fn due_date_check() {
        let mut a = assignment(1, 0);
        let now = Utc::now();
        assert!(!a.is_past_due(now));
        a.due_date = Some(now - chrono::Duration::minutes(1));
        assert!(a.is_past_due(now));
    }
}
