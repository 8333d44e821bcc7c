// service/reward_issuer.rs
//
// Scheduled reconciliation against the synced appointment feed. Advances
// booked referrals to credited/cancelled, sweeps stale clicks to expired,
// and issues referrer credit plus tier milestone bonuses. Best-effort batch:
// one referral's failure never aborts the rest.
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{db::ReferralStore, memberdb::MemberExt, referraldb::ReferralExt, syncdb::SyncExt},
    models::{membermodel::Member, referralmodel::Referral},
    service::{
        audit::AuditService,
        error::ServiceError,
        referral_code_service::RewardSchedule,
        scheduling_api::{CreditAdjustment, SchedulingApi},
    },
};

/// Clicked referrals older than this are swept to expired so pending-reward
/// liability and the matching candidate pool stay bounded.
const CLICK_EXPIRY_DAYS: i64 = 90;

/// Best-effort appointment discovery window when no explicit link exists.
const APPOINTMENT_LOOKUP_DAYS: i64 = 90;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub expired: u64,
    pub credited: u64,
    pub cancelled: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

enum Outcome {
    Credited,
    Cancelled,
    /// Not ready yet (appointment pending, member unlinked, or another run
    /// got there first). Retried on the next pass, never an error.
    Skipped,
}

#[derive(Clone)]
pub struct RewardIssuer {
    db_client: Arc<dyn ReferralStore>,
    scheduling: Arc<dyn SchedulingApi>,
    audit: Arc<AuditService>,
    schedule: Arc<RewardSchedule>,
}

impl RewardIssuer {
    pub fn new(
        db_client: Arc<dyn ReferralStore>,
        scheduling: Arc<dyn SchedulingApi>,
        audit: Arc<AuditService>,
        schedule: Arc<RewardSchedule>,
    ) -> Self {
        Self {
            db_client,
            scheduling,
            audit,
            schedule,
        }
    }

    pub async fn run(&self) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary::default();

        let cutoff = Utc::now() - Duration::days(CLICK_EXPIRY_DAYS);
        match self.db_client.expire_stale_clicks(cutoff).await {
            Ok(expired) => summary.expired = expired,
            Err(err) => summary.errors.push(format!("expiry sweep: {}", err)),
        }

        let pending = match self.db_client.get_booked_awaiting_credit().await {
            Ok(pending) => pending,
            Err(err) => {
                summary.errors.push(format!("pending fetch: {}", err));
                return summary;
            }
        };

        for referral in pending {
            let referral_id = referral.id;
            match self.process_one(referral).await {
                Ok(Outcome::Credited) => summary.credited += 1,
                Ok(Outcome::Cancelled) => summary.cancelled += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    tracing::error!("reconciliation failed for referral {}: {}", referral_id, err);
                    summary.errors.push(format!("referral {}: {}", referral_id, err));
                }
            }
        }

        tracing::info!(
            "reconciliation done: {} credited, {} cancelled, {} expired, {} skipped, {} errors",
            summary.credited,
            summary.cancelled,
            summary.expired,
            summary.skipped,
            summary.errors.len()
        );

        summary
    }

    async fn process_one(&self, referral: Referral) -> Result<Outcome, ServiceError> {
        // Resolve the appointment, discovering and persisting the link when
        // the attribution never carried one.
        let appointment = match referral.external_appointment_id.as_deref() {
            Some(external_id) => self.db_client.get_synced_appointment(external_id).await?,
            None => {
                let Some(last10) = referral.referee_phone.as_deref() else {
                    return Ok(Outcome::Skipped);
                };
                let since = Utc::now() - Duration::days(APPOINTMENT_LOOKUP_DAYS);
                let found = self.db_client.find_appointment_by_phone(last10, since).await?;
                if let Some(ref appointment) = found {
                    self.db_client
                        .link_appointment(referral.id, &appointment.external_id)
                        .await?;
                }
                found
            }
        };

        let Some(appointment) = appointment else {
            return Ok(Outcome::Skipped);
        };

        if appointment.is_cancelled() {
            self.db_client.mark_cancelled(referral.id).await?;
            let _ = self
                .audit
                .log_cancelled(referral.id, &appointment.status)
                .await;
            return Ok(Outcome::Cancelled);
        }

        if !appointment.is_completed() {
            return Ok(Outcome::Skipped);
        }

        let referrer = self
            .db_client
            .get_member(referral.referrer_member_id)
            .await?
            .ok_or(ServiceError::MemberNotFound(referral.referrer_member_id))?;

        // Member not linked to a scheduling client yet: try to discover the
        // link from the synced client feed, otherwise retry next run.
        let external_client_id = match referrer.external_client_id.clone() {
            Some(id) => id,
            None => match self.discover_client_link(&referrer).await? {
                Some(id) => id,
                None => {
                    tracing::debug!(
                        "referrer {} not linked to a scheduling client, deferring credit",
                        referrer.id
                    );
                    return Ok(Outcome::Skipped);
                }
            },
        };

        let code = self
            .db_client
            .get_code_by_id(referral.referral_code_id)
            .await?
            .ok_or(ServiceError::ReferralNotFound(referral.id))?;

        let reward_cents = self.schedule.referrer_reward_cents(code.tier);

        self.scheduling
            .adjust_credit(CreditAdjustment {
                external_client_id: external_client_id.clone(),
                delta_cents: reward_cents,
                reason: format!("Referral reward for code {}", code.code),
            })
            .await?;

        // Optimistic guard: zero rows affected means a concurrent run
        // already issued this credit. Log and move on without counting.
        let issued = self
            .db_client
            .mark_credited_if_unissued(referral.id, appointment.completed_at)
            .await?;
        if !issued {
            tracing::warn!(
                "referrer credit for {} already issued by another run",
                referral.id
            );
            return Ok(Outcome::Skipped);
        }

        let _ = self
            .audit
            .log_referrer_credited(referral.id, reward_cents, &appointment.external_id)
            .await;

        let updated_code = self
            .db_client
            .apply_completed_credit(code.id, reward_cents)
            .await?;

        let new_tier = self.schedule.compute_tier(updated_code.total_completed);
        if new_tier != code.tier {
            self.db_client.update_code_tier(code.id, new_tier).await?;

            let bonus = self.schedule.milestone_bonus_cents(code.tier, new_tier);
            if let Some(bonus_cents) = bonus {
                // Bonus failure is recorded but the base credit stands.
                if let Err(err) = self
                    .scheduling
                    .adjust_credit(CreditAdjustment {
                        external_client_id,
                        delta_cents: bonus_cents,
                        reason: format!("Referral milestone bonus for reaching {:?}", new_tier),
                    })
                    .await
                {
                    tracing::error!(
                        "milestone bonus for code {} failed: {}",
                        updated_code.code,
                        err
                    );
                }
            }

            let _ = self
                .audit
                .log_tier_up(referral.id, code.tier, new_tier, bonus)
                .await;
        }

        Ok(Outcome::Credited)
    }

    /// Look the referrer up in the synced client feed by phone and persist
    /// the link so subsequent runs skip the lookup.
    async fn discover_client_link(
        &self,
        referrer: &Member,
    ) -> Result<Option<String>, ServiceError> {
        let Some(raw_phone) = referrer.phone.as_deref() else {
            return Ok(None);
        };
        let last10 = crate::utils::phone::last_ten_digits(raw_phone);

        let Some(client) = self.db_client.get_synced_client_by_phone(&last10).await? else {
            return Ok(None);
        };

        self.db_client
            .link_member_external_client(referrer.id, &client.external_client_id)
            .await?;

        Ok(Some(client.external_client_id))
    }
}
