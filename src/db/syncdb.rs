// db/syncdb.rs
//
// Read-only access to tables mirrored from the scheduling provider by the
// external sync process. This service never writes to them.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::db::DBClient;

use crate::models::syncmodels::{SyncedAppointment, SyncedClient};

const APPOINTMENT_COLUMNS: &str =
    "external_id, client_phone, status, location_key, completed_at, updated_at";

const CLIENT_COLUMNS: &str = "external_client_id, phone, email, completed_visit_count";

#[async_trait]
pub trait SyncExt {
    async fn get_synced_appointment(
        &self,
        external_id: &str,
    ) -> Result<Option<SyncedAppointment>, sqlx::Error>;

    /// Best-effort appointment discovery by referee phone within a window,
    /// used when the attribution never carried an appointment id.
    async fn find_appointment_by_phone(
        &self,
        phone_last10: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<SyncedAppointment>, sqlx::Error>;

    async fn get_synced_client_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<SyncedClient>, sqlx::Error>;
}

#[async_trait]
impl SyncExt for DBClient {
    async fn get_synced_appointment(
        &self,
        external_id: &str,
    ) -> Result<Option<SyncedAppointment>, sqlx::Error> {
        sqlx::query_as::<_, SyncedAppointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM synced_appointments WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_appointment_by_phone(
        &self,
        phone_last10: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<SyncedAppointment>, sqlx::Error> {
        sqlx::query_as::<_, SyncedAppointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS} FROM synced_appointments
            WHERE RIGHT(regexp_replace(COALESCE(client_phone, ''), '\D', '', 'g'), 10) = $1
            AND updated_at >= $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#
        ))
        .bind(phone_last10)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_synced_client_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<SyncedClient>, sqlx::Error> {
        sqlx::query_as::<_, SyncedClient>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS} FROM synced_clients
            WHERE RIGHT(regexp_replace(COALESCE(phone, ''), '\D', '', 'g'), 10) = $1
            LIMIT 1
            "#
        ))
        .bind(phone_last10)
        .fetch_optional(&self.pool)
        .await
    }
}
