//! Server-side countdown for a session.
//!
//! The deadline is fixed when the session is created. Clients reconcile their
//! local countdown against `deadline_at` and `server_time`; nothing here trusts
//! a client clock.

use chrono::{DateTime, Duration, Utc};

use crate::models::session::{SessionStatus, SubmissionTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    pub started_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
}

impl SessionClock {
    pub fn start(started_at: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            started_at,
            deadline_at: started_at + Duration::minutes(duration_minutes.max(0) as i64),
        }
    }

    pub fn from_bounds(started_at: DateTime<Utc>, deadline_at: DateTime<Utc>) -> Self {
        Self { started_at, deadline_at }
    }

    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline_at - now).num_seconds().max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline_at
    }

    /// Terminal status for a submission arriving at `now`.
    pub fn closing_status(&self, now: DateTime<Utc>, trigger: SubmissionTrigger) -> SessionStatus {
        match trigger {
            SubmissionTrigger::Timer => SessionStatus::TimedOut,
            SubmissionTrigger::Manual | SubmissionTrigger::Proctoring => {
                if now > self.deadline_at {
                    SessionStatus::TimedOut
                } else {
                    SessionStatus::Completed
                }
            }
        }
    }

    /// The sweeper closes at the deadline, not at the moment it happens to run.
    pub fn effective_close_time(
        &self,
        now: DateTime<Utc>,
        trigger: SubmissionTrigger,
    ) -> DateTime<Utc> {
        match trigger {
            SubmissionTrigger::Timer if now > self.deadline_at => self.deadline_at,
            _ => now,
        }
    }
}
