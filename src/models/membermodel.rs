use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub first_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Client id at the scheduling provider, populated by the sync process.
    pub external_client_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
