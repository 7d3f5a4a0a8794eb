use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Test {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub domain: String,
    pub level: String,
    pub duration_minutes: i32,
    pub passing_score: i32,
    pub project_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
