use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Appointment row mirrored from the scheduling provider by the external
/// sync process. Read-only from this service's point of view.
#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct SyncedAppointment {
    pub external_id: String,
    pub client_phone: Option<String>,
    pub status: String,
    pub location_key: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncedAppointment {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status.as_str(), "cancelled" | "no_show")
    }
}

/// Client row mirrored from the scheduling provider.
#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct SyncedClient {
    pub external_client_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub completed_visit_count: i32,
}
