use serde::Serialize;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow, Serialize, Debug)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: String,
    #[serde(rename = "teacher")]
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
