use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::database::store::{AssessmentStore, AssignmentFilter};
use crate::dto::admin_dto::{AssignmentQuery, CreateAssignmentsRequest};
use crate::error::{Error, Result};
use crate::models::assignment::{AssignmentStatus, TestAssignment};

#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn AssessmentStore>,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    /// One assignment per user. Duplicate user ids in the request are collapsed.
    pub async fn assign(
        &self,
        organization_id: Uuid,
        assigned_by: Uuid,
        payload: CreateAssignmentsRequest,
    ) -> Result<Vec<TestAssignment>> {
        match self.store.get_test(payload.test_id).await? {
            Some(test) if test.organization_id == organization_id => {}
            _ => return Err(Error::NotFound("Test not found".to_string())),
        }

        let now = Utc::now();
        if payload.due_date.map(|due| due <= now).unwrap_or(false) {
            return Err(Error::BadRequest("due_date must be in the future".to_string()));
        }

        let mut user_ids = payload.user_ids.clone();
        user_ids.sort();
        user_ids.dedup();

        let mut created = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let assignment = TestAssignment {
                id: Uuid::new_v4(),
                organization_id,
                test_id: payload.test_id,
                user_id,
                assigned_by,
                status: AssignmentStatus::Assigned,
                due_date: payload.due_date,
                max_attempts: payload.max_attempts.unwrap_or(1),
                attempts_used: 0,
                created_at: now,
                updated_at: now,
            };
            self.store.insert_assignment(&assignment).await?;
            created.push(assignment);
        }

        tracing::info!(
            test_id = %payload.test_id,
            count = created.len(),
            "Test assigned"
        );
        Ok(created)
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        query: AssignmentQuery,
    ) -> Result<Vec<TestAssignment>> {
        self.store
            .list_assignments(&AssignmentFilter {
                organization_id: Some(organization_id),
                test_id: query.test_id,
                user_id: query.user_id,
                status: query.status,
            })
            .await
    }

    pub async fn list_for_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TestAssignment>> {
        self.store
            .list_assignments(&AssignmentFilter {
                organization_id: Some(organization_id),
                user_id: Some(user_id),
                ..Default::default()
            })
            .await
    }
}
