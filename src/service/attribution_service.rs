// service/attribution_service.rs
//
// Click recording, claims, invitations and the checkout attribution matcher.
// The matching priority in `attribute` is a deliberate tie-break policy, not
// an incidental ordering; see the comments on each step.
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    db::{
        db::ReferralStore,
        memberdb::MemberExt,
        referraldb::{AttributionUpdate, NewReferral, ReferralExt},
        syncdb::SyncExt,
    },
    dtos::referraldtos::AttributeReferralDto,
    models::{
        membermodel::Member,
        referralmodel::{Referral, ReferralStatus},
    },
    service::{
        audit::AuditService,
        error::ServiceError,
        fraud::{self, FraudEvaluator, FraudVerdict},
        referral_code_service::{generate_referral_link, ReferralCodeService},
        scheduling_api::{CreditAdjustment, SchedulingApi},
        sms::SmsApi,
    },
    utils::{currency, phone},
};

/// Pending invitations allowed per referrer per rolling 30 days.
const PENDING_INVITE_LIMIT: i64 = 20;

/// Last-resort attribution window for anonymous clicks.
const RECENT_CLICK_WINDOW_DAYS: i64 = 30;

#[derive(Debug)]
pub struct AttributionOutcome {
    pub referral: Referral,
    pub matched_by: &'static str,
    pub verdict: FraudVerdict,
}

#[derive(Debug)]
pub struct InviteOutcome {
    pub referral: Referral,
    pub sms_sent: bool,
    pub share_link: String,
}

#[derive(Clone)]
pub struct AttributionService {
    db_client: Arc<dyn ReferralStore>,
    code_service: Arc<ReferralCodeService>,
    fraud_evaluator: FraudEvaluator,
    audit: Arc<AuditService>,
    scheduling: Arc<dyn SchedulingApi>,
    sms: Arc<dyn SmsApi>,
    app_url: String,
}

impl AttributionService {
    pub fn new(
        db_client: Arc<dyn ReferralStore>,
        code_service: Arc<ReferralCodeService>,
        audit: Arc<AuditService>,
        scheduling: Arc<dyn SchedulingApi>,
        sms: Arc<dyn SmsApi>,
        app_url: String,
    ) -> Self {
        Self {
            fraud_evaluator: FraudEvaluator::new(db_client.clone()),
            db_client,
            code_service,
            audit,
            scheduling,
            sms,
            app_url,
        }
    }

    /// A visitor landed on a referral link. No referee contact yet.
    pub async fn record_click(
        &self,
        code_value: &str,
        device_id: &str,
        channel: Option<String>,
    ) -> Result<Referral, ServiceError> {
        let code = self
            .code_service
            .resolve(code_value)
            .await?
            .ok_or_else(|| ServiceError::ReferralCodeNotFound(code_value.to_string()))?;

        let referral = self
            .db_client
            .save_referral(NewReferral {
                referral_code_id: code.id,
                referrer_member_id: code.member_id,
                status: ReferralStatus::Clicked,
                referee_device_id: Some(device_id.to_string()),
                channel,
                ..Default::default()
            })
            .await?;

        self.db_client.record_code_click(code.id).await?;
        let _ = self.audit.log_click(&referral).await;

        Ok(referral)
    }

    /// An authenticated referee locks in a code before booking. One lifetime
    /// referral credit per phone number.
    pub async fn claim(
        &self,
        claimant: &Member,
        code_value: &str,
        device_id: Option<&str>,
    ) -> Result<Referral, ServiceError> {
        let code = self
            .code_service
            .resolve(code_value)
            .await?
            .ok_or_else(|| ServiceError::ReferralCodeNotFound(code_value.to_string()))?;

        let claimant_phone = claimant.phone.as_deref().map(phone::last_ten_digits);

        let referrer = self.referrer_of(&code.member_id).await?;
        let flags = fraud::self_referral_flags(
            &referrer,
            claimant_phone.as_deref(),
            claimant.email.as_deref(),
        );

        // Owner claiming their own code: the click itself is legitimate
        // telemetry, so a row is still written, forced straight into
        // fraud_rejected. The caller gets the conflict either way.
        if code.member_id == claimant.id || !flags.is_empty() {
            let pending = match device_id {
                Some(device_id) => {
                    self.db_client
                        .find_pending_by_code_and_device(code.id, device_id)
                        .await?
                }
                None => None,
            };
            let referral = match pending {
                Some(referral) => referral,
                None => {
                    self.db_client
                        .save_referral(NewReferral {
                            referral_code_id: code.id,
                            referrer_member_id: code.member_id,
                            status: ReferralStatus::Clicked,
                            referee_device_id: device_id.map(|s| s.to_string()),
                            ..Default::default()
                        })
                        .await?
                }
            };
            self.db_client
                .mark_fraud_rejected(referral.id, flags)
                .await?;
            return Err(ServiceError::SelfReferral);
        }

        if let Some(ref last10) = claimant_phone {
            if self
                .db_client
                .exists_lifetime_claim_for_phone(last10, None)
                .await?
            {
                return Err(ServiceError::AlreadyClaimed);
            }
        }

        // Bind to the pending click for this device if one exists, otherwise
        // start the referral at claimed.
        let pending = match device_id {
            Some(device_id) => {
                self.db_client
                    .find_pending_by_code_and_device(code.id, device_id)
                    .await?
            }
            None => None,
        };

        let referral = match pending {
            Some(pending) => {
                self.db_client
                    .mark_claimed(
                        pending.id,
                        claimant_phone.as_deref(),
                        claimant.email.as_deref(),
                    )
                    .await?
            }
            None => {
                self.db_client
                    .save_referral(NewReferral {
                        referral_code_id: code.id,
                        referrer_member_id: code.member_id,
                        status: ReferralStatus::Claimed,
                        referee_phone: claimant_phone,
                        referee_email: claimant.email.clone(),
                        referee_device_id: device_id.map(|s| s.to_string()),
                        ..Default::default()
                    })
                    .await?
            }
        };

        let _ = self.audit.log_claim(&referral).await;
        Ok(referral)
    }

    /// A referrer invites a friend by phone. SMS failure degrades to a
    /// manually shareable link.
    pub async fn invite(
        &self,
        referrer: &Member,
        first_name: &str,
        invite_phone: &str,
        send_sms: bool,
    ) -> Result<InviteOutcome, ServiceError> {
        let last10 = phone::last_ten_digits(invite_phone);
        if last10.len() < 10 {
            return Err(ServiceError::Validation(
                "Phone number must carry at least 10 digits".to_string(),
            ));
        }

        if let Some(referrer_phone) = referrer.phone.as_deref() {
            if phone::same_phone(referrer_phone, invite_phone) {
                return Err(ServiceError::SelfReferral);
            }
        }

        let since = Utc::now() - Duration::days(30);
        let pending = self
            .db_client
            .count_pending_invites(referrer.id, since)
            .await?;
        if pending >= PENDING_INVITE_LIMIT {
            return Err(ServiceError::InviteLimitReached(pending));
        }

        let code = self.code_service.get_or_create_primary(referrer.id).await?;
        let share_link = generate_referral_link(&self.app_url, &code.code);

        let referral = self
            .db_client
            .save_referral(NewReferral {
                referral_code_id: code.id,
                referrer_member_id: referrer.id,
                status: ReferralStatus::Invited,
                referee_first_name: Some(first_name.to_string()),
                referee_phone: Some(last10),
                ..Default::default()
            })
            .await?;

        let mut sms_sent = false;
        if send_sms {
            let body = format!(
                "{} invited you to Glowhaus! Book with their link and get {} off your first visit: {}",
                referrer.first_name,
                currency::format_cents_as_dollars(self.code_service.schedule().referee_reward_cents),
                share_link
            );
            match self.sms.send_sms(invite_phone, &body).await {
                Ok(ok) => sms_sent = ok,
                Err(err) => {
                    tracing::warn!("invite SMS to ...{} failed: {}", &last_four(invite_phone), err);
                }
            }
        }

        self.db_client.record_code_share(code.id).await?;
        let _ = self.audit.log_invite(&referral, sms_sent).await;

        Ok(InviteOutcome {
            referral,
            sms_sent,
            share_link,
        })
    }

    /// Attribute a checkout to a pending referral. First match wins, in the
    /// fixed priority order below; if nothing matches, a referral is
    /// synthesized retroactively rather than dropping the attribution.
    pub async fn attribute(
        &self,
        body: &AttributeReferralDto,
    ) -> Result<AttributionOutcome, ServiceError> {
        let code = self
            .code_service
            .resolve(&body.code)
            .await?
            .ok_or_else(|| ServiceError::ReferralCodeNotFound(body.code.clone()))?;

        let checkout_phone = body.phone.as_deref().map(phone::last_ten_digits);
        let device_id = body.device_id.as_deref();

        let (referral, matched_by) = self
            .find_or_create_match(&code.id, code.member_id, checkout_phone.as_deref(), device_id)
            .await?;

        let referrer = self.referrer_of(&referral.referrer_member_id).await?;

        let verdict = self
            .fraud_evaluator
            .evaluate(
                referral.id,
                &referrer,
                checkout_phone.as_deref().or(referral.referee_phone.as_deref()),
                body.email.as_deref().or(referral.referee_email.as_deref()),
            )
            .await?;

        // The code row the matched referral actually belongs to drives the
        // reward tier (steps 1 and 3 may match across codes).
        let reward_code = if referral.referral_code_id == code.id {
            code.clone()
        } else {
            self.db_client
                .get_code_by_id(referral.referral_code_id)
                .await?
                .ok_or(ServiceError::ReferralNotFound(referral.id))?
        };

        let schedule = self.code_service.schedule();
        let status = if verdict.is_self_referral() {
            ReferralStatus::FraudRejected
        } else {
            ReferralStatus::Booked
        };

        if !referral.status.can_transition_to(status) {
            return Err(ServiceError::Validation(format!(
                "Referral {} cannot move from {:?} to {:?}",
                referral.id, referral.status, status
            )));
        }

        // Flags land on the row before any credit-issuing call so a crash
        // in between leaves an auditable, not-yet-credited record.
        let referral = self
            .db_client
            .apply_attribution(AttributionUpdate {
                referral_id: referral.id,
                status,
                referee_phone: checkout_phone.clone(),
                referee_email: body.email.clone(),
                referee_device_id: body.device_id.clone(),
                location_key: body.location_key.clone(),
                external_appointment_id: body.appointment_id.clone(),
                referrer_reward_cents: schedule.referrer_reward_cents(reward_code.tier),
                referee_reward_cents: schedule.referee_reward_cents,
                is_self_referral: verdict.is_self_referral(),
                fraud_flags: verdict.flags.clone(),
            })
            .await?;

        let _ = self
            .audit
            .log_attribution(&referral, matched_by, &verdict.flags)
            .await;

        if status == ReferralStatus::Booked {
            self.db_client.record_code_signup(reward_code.id).await?;

            if !verdict.blocks_referee_credit() {
                self.issue_referee_credit(&referral, body.client_id.as_deref())
                    .await;
            }
        }

        Ok(AttributionOutcome {
            referral,
            matched_by,
            verdict,
        })
    }

    async fn find_or_create_match(
        &self,
        code_id: &Uuid,
        code_member_id: Uuid,
        checkout_phone: Option<&str>,
        device_id: Option<&str>,
    ) -> Result<(Referral, &'static str), ServiceError> {
        // 1. An explicit claim by this phone beats everything.
        if let Some(last10) = checkout_phone {
            if let Some(referral) = self.db_client.find_claimed_by_phone(last10).await? {
                return Ok((referral, "claimed_phone"));
            }
        }

        // 2. Same code, same device.
        if let Some(device_id) = device_id {
            if let Some(referral) = self
                .db_client
                .find_pending_by_code_and_device(*code_id, device_id)
                .await?
            {
                return Ok((referral, "device_id"));
            }
        }

        // 3. An intentional invitation from any referrer takes precedence
        //    over an anonymous click on this code.
        if let Some(last10) = checkout_phone {
            if let Some(referral) = self.db_client.find_invited_by_phone(last10).await? {
                return Ok((referral, "invited_phone"));
            }

            // 4. Same code, matching phone.
            if let Some(referral) = self
                .db_client
                .find_pending_by_code_and_phone(*code_id, last10)
                .await?
            {
                return Ok((referral, "code_phone"));
            }
        }

        // 5. Most recent anonymous click on this code within the window.
        let since = Utc::now() - Duration::days(RECENT_CLICK_WINDOW_DAYS);
        if let Some(referral) = self
            .db_client
            .find_recent_pending_by_code(*code_id, since)
            .await?
        {
            return Ok((referral, "recent_click"));
        }

        // 6. Nothing matched: synthesize the click retroactively.
        let referral = self
            .db_client
            .save_referral(NewReferral {
                referral_code_id: *code_id,
                referrer_member_id: code_member_id,
                status: ReferralStatus::Clicked,
                referee_device_id: device_id.map(|s| s.to_string()),
                ..Default::default()
            })
            .await?;
        let _ = self.audit.log_retroactive_click(&referral).await;

        Ok((referral, "retroactive"))
    }

    /// Synchronous referee credit at booking time. Failure is non-fatal;
    /// the flag trail on the row is already durable.
    async fn issue_referee_credit(&self, referral: &Referral, client_id: Option<&str>) {
        let external_client_id = match client_id {
            Some(id) => Some(id.to_string()),
            None => match referral.referee_phone.as_deref() {
                Some(last10) => match self.db_client.get_synced_client_by_phone(last10).await {
                    Ok(client) => client.map(|c| c.external_client_id),
                    Err(err) => {
                        tracing::warn!("synced client lookup failed for referral {}: {}", referral.id, err);
                        None
                    }
                },
                None => None,
            },
        };

        let Some(external_client_id) = external_client_id else {
            tracing::debug!(
                "referral {} has no external client id yet, referee credit deferred",
                referral.id
            );
            return;
        };

        let adjustment = CreditAdjustment {
            external_client_id,
            delta_cents: referral.referee_reward_cents,
            reason: "Welcome credit from a friend's referral".to_string(),
        };

        match self.scheduling.adjust_credit(adjustment).await {
            Ok(()) => match self
                .db_client
                .mark_referee_credited_if_unissued(referral.id)
                .await
            {
                Ok(true) => {
                    let _ = self
                        .audit
                        .log_referee_credited(referral.id, referral.referee_reward_cents)
                        .await;
                }
                Ok(false) => {
                    tracing::warn!("referee credit for {} already issued elsewhere", referral.id);
                }
                Err(err) => {
                    tracing::error!(
                        "referee credit issued for {} but flag write failed: {}",
                        referral.id,
                        err
                    );
                }
            },
            Err(err) => {
                tracing::warn!("referee credit call failed for {}: {}", referral.id, err);
            }
        }
    }

    async fn referrer_of(&self, member_id: &Uuid) -> Result<Member, ServiceError> {
        self.db_client
            .get_member(*member_id)
            .await?
            .ok_or(ServiceError::MemberNotFound(*member_id))
    }
}

fn last_four(phone: &str) -> String {
    let digits = phone::last_ten_digits(phone);
    if digits.len() >= 4 {
        digits[digits.len() - 4..].to_string()
    } else {
        digits
    }
}
