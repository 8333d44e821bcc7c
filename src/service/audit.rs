// service/audit.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{db::ReferralStore, referraldb::ReferralExt},
    models::referralmodel::{FraudFlag, Referral, ReferralTier},
    service::error::ServiceError,
};

/// Append-only referral event log. Written for observability and dispute
/// resolution; business logic never reads it back.
#[derive(Clone)]
pub struct AuditService {
    db_client: Arc<dyn ReferralStore>,
}

impl AuditService {
    pub fn new(db_client: Arc<dyn ReferralStore>) -> Self {
        Self { db_client }
    }

    async fn log_event(
        &self,
        referral_id: Uuid,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> Result<(), ServiceError> {
        self.db_client
            .insert_referral_event(referral_id, event_type, Some(metadata))
            .await?;
        Ok(())
    }

    pub async fn log_click(&self, referral: &Referral) -> Result<(), ServiceError> {
        self.log_event(
            referral.id,
            "click",
            serde_json::json!({
                "device_id": referral.referee_device_id,
                "channel": referral.channel,
            }),
        )
        .await
    }

    pub async fn log_invite(&self, referral: &Referral, sms_sent: bool) -> Result<(), ServiceError> {
        self.log_event(
            referral.id,
            "invite",
            serde_json::json!({
                "referee_first_name": referral.referee_first_name,
                "sms_sent": sms_sent,
            }),
        )
        .await
    }

    pub async fn log_claim(&self, referral: &Referral) -> Result<(), ServiceError> {
        self.log_event(
            referral.id,
            "claim",
            serde_json::json!({ "referee_phone": referral.referee_phone }),
        )
        .await
    }

    /// A referral synthesized at attribution time because nothing matched.
    /// Its own event type keeps it distinguishable from a real click.
    pub async fn log_retroactive_click(&self, referral: &Referral) -> Result<(), ServiceError> {
        self.log_event(
            referral.id,
            "retroactive_click",
            serde_json::json!({ "device_id": referral.referee_device_id }),
        )
        .await
    }

    pub async fn log_attribution(
        &self,
        referral: &Referral,
        matched_by: &str,
        flags: &[FraudFlag],
    ) -> Result<(), ServiceError> {
        self.log_event(
            referral.id,
            "attribution",
            serde_json::json!({
                "matched_by": matched_by,
                "status": referral.status,
                "fraud_flags": flags,
                "appointment_id": referral.external_appointment_id,
            }),
        )
        .await
    }

    pub async fn log_referee_credited(
        &self,
        referral_id: Uuid,
        amount_cents: i64,
    ) -> Result<(), ServiceError> {
        self.log_event(
            referral_id,
            "referee_credited",
            serde_json::json!({ "amount_cents": amount_cents }),
        )
        .await
    }

    pub async fn log_referrer_credited(
        &self,
        referral_id: Uuid,
        amount_cents: i64,
        appointment_id: &str,
    ) -> Result<(), ServiceError> {
        self.log_event(
            referral_id,
            "referrer_credited",
            serde_json::json!({
                "amount_cents": amount_cents,
                "appointment_id": appointment_id,
            }),
        )
        .await
    }

    pub async fn log_cancelled(
        &self,
        referral_id: Uuid,
        appointment_status: &str,
    ) -> Result<(), ServiceError> {
        self.log_event(
            referral_id,
            "cancelled",
            serde_json::json!({ "appointment_status": appointment_status }),
        )
        .await
    }

    pub async fn log_tier_up(
        &self,
        referral_id: Uuid,
        from: ReferralTier,
        to: ReferralTier,
        bonus_cents: Option<i64>,
    ) -> Result<(), ServiceError> {
        self.log_event(
            referral_id,
            "tier_up",
            serde_json::json!({
                "from": from,
                "to": to,
                "bonus_cents": bonus_cents,
            }),
        )
        .await
    }
}
