// db/referraldb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;

use crate::models::referralmodel::{
    FraudFlag, Referral, ReferralCode, ReferralEvent, ReferralStatus, ReferralTier,
};

const CODE_COLUMNS: &str = r#"
    id, member_id, code, custom_code, tier, is_primary,
    total_shares, total_clicks, total_signups, total_completed,
    total_earned_cents, created_at, updated_at
"#;

const REFERRAL_COLUMNS: &str = r#"
    id, referral_code_id, referrer_member_id,
    referee_first_name, referee_phone, referee_email, referee_device_id,
    status, channel, location_key,
    referrer_reward_cents, referee_reward_cents,
    is_self_referral, fraud_flags,
    clicked_at, invited_at, claimed_at, booked_at, completed_at, credited_at,
    external_appointment_id, referrer_credit_issued, referee_credit_issued,
    created_at, updated_at
"#;

/// Insert payload for a new referral row. Referee identity fields fill in
/// progressively as the funnel advances; phone is stored in last-10-digit
/// form so equality matching works across formats.
#[derive(Debug, Default, Clone)]
pub struct NewReferral {
    pub referral_code_id: Uuid,
    pub referrer_member_id: Uuid,
    pub status: ReferralStatus,
    pub referee_first_name: Option<String>,
    pub referee_phone: Option<String>,
    pub referee_email: Option<String>,
    pub referee_device_id: Option<String>,
    pub channel: Option<String>,
    pub location_key: Option<String>,
}

/// Attribution write applied in one statement: referee identity, appointment
/// link, rewards, fraud verdict and the booked (or fraud_rejected) status.
#[derive(Debug, Clone)]
pub struct AttributionUpdate {
    pub referral_id: Uuid,
    pub status: ReferralStatus,
    pub referee_phone: Option<String>,
    pub referee_email: Option<String>,
    pub referee_device_id: Option<String>,
    pub location_key: Option<String>,
    pub external_appointment_id: Option<String>,
    pub referrer_reward_cents: i64,
    pub referee_reward_cents: i64,
    pub is_self_referral: bool,
    pub fraud_flags: Vec<FraudFlag>,
}

#[async_trait]
pub trait ReferralExt {
    // --- referral codes ---

    async fn get_code_by_id(&self, code_id: Uuid) -> Result<Option<ReferralCode>, sqlx::Error>;

    async fn get_codes_by_member(&self, member_id: Uuid)
        -> Result<Vec<ReferralCode>, sqlx::Error>;

    async fn get_primary_code(&self, member_id: Uuid)
        -> Result<Option<ReferralCode>, sqlx::Error>;

    /// Match either the generated code or a custom code, case-insensitively.
    async fn find_code_by_value(&self, value: &str)
        -> Result<Option<ReferralCode>, sqlx::Error>;

    /// Resolve the primary code of the member whose phone ends with the
    /// given 10 digits (referees often share a phone number as a code).
    async fn find_code_by_member_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<ReferralCode>, sqlx::Error>;

    async fn code_value_exists(&self, value: &str) -> Result<bool, sqlx::Error>;

    async fn count_member_codes(&self, member_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn save_code(
        &self,
        member_id: Uuid,
        code: &str,
        is_primary: bool,
    ) -> Result<ReferralCode, sqlx::Error>;

    /// Vanity codes ride on their own non-primary row. Single statement so
    /// a unique violation on either column leaves no row behind.
    async fn save_custom_code(
        &self,
        member_id: Uuid,
        code: &str,
        custom_code: &str,
    ) -> Result<ReferralCode, sqlx::Error>;

    async fn record_code_share(&self, code_id: Uuid) -> Result<(), sqlx::Error>;

    async fn record_code_click(&self, code_id: Uuid) -> Result<(), sqlx::Error>;

    async fn record_code_signup(&self, code_id: Uuid) -> Result<(), sqlx::Error>;

    /// Bump completed count and earned total in one statement, returning the
    /// updated row so the caller can recompute the tier from fresh counts.
    async fn apply_completed_credit(
        &self,
        code_id: Uuid,
        earned_cents: i64,
    ) -> Result<ReferralCode, sqlx::Error>;

    async fn update_code_tier(
        &self,
        code_id: Uuid,
        tier: ReferralTier,
    ) -> Result<ReferralCode, sqlx::Error>;

    // --- referrals ---

    async fn save_referral(&self, new_referral: NewReferral) -> Result<Referral, sqlx::Error>;

    async fn mark_claimed(
        &self,
        referral_id: Uuid,
        referee_phone: Option<&str>,
        referee_email: Option<&str>,
    ) -> Result<Referral, sqlx::Error>;

    async fn apply_attribution(&self, update: AttributionUpdate) -> Result<Referral, sqlx::Error>;

    /// Force the terminal fraud_rejected state, keeping the row as
    /// telemetry. No credit path ever runs for these.
    async fn mark_fraud_rejected(
        &self,
        referral_id: Uuid,
        fraud_flags: Vec<FraudFlag>,
    ) -> Result<Referral, sqlx::Error>;

    // --- attribution matching candidates (priority order lives in the
    //     attribution service, these are the individual lookups) ---

    async fn find_claimed_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error>;

    async fn find_pending_by_code_and_device(
        &self,
        code_id: Uuid,
        device_id: &str,
    ) -> Result<Option<Referral>, sqlx::Error>;

    async fn find_invited_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error>;

    async fn find_pending_by_code_and_phone(
        &self,
        code_id: Uuid,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error>;

    async fn find_recent_pending_by_code(
        &self,
        code_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<Referral>, sqlx::Error>;

    /// One lifetime referral credit per person: any claimed/booked/completed/
    /// credited referral for this phone consumes it.
    async fn exists_lifetime_claim_for_phone(
        &self,
        phone_last10: &str,
        exclude_referral_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>;

    /// Duplicate-phone fraud check: booked or later elsewhere.
    async fn exists_booked_or_later_for_phone(
        &self,
        phone_last10: &str,
        exclude_referral_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>;

    async fn count_pending_invites(
        &self,
        referrer_member_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>;

    // --- reconciliation ---

    async fn get_booked_awaiting_credit(&self) -> Result<Vec<Referral>, sqlx::Error>;

    async fn expire_stale_clicks(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error>;

    async fn link_appointment(
        &self,
        referral_id: Uuid,
        external_appointment_id: &str,
    ) -> Result<(), sqlx::Error>;

    /// Conditional credited transition. Returns false when zero rows were
    /// affected, i.e. another run already issued the referrer credit.
    async fn mark_credited_if_unissued(
        &self,
        referral_id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error>;

    /// Same optimistic guard for the referee side.
    async fn mark_referee_credited_if_unissued(
        &self,
        referral_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    async fn mark_cancelled(&self, referral_id: Uuid) -> Result<(), sqlx::Error>;

    // --- audit log ---

    async fn insert_referral_event(
        &self,
        referral_id: Uuid,
        event_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<ReferralEvent, sqlx::Error>;
}

#[async_trait]
impl ReferralExt for DBClient {
    async fn get_code_by_id(&self, code_id: Uuid) -> Result<Option<ReferralCode>, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "SELECT {CODE_COLUMNS} FROM referral_codes WHERE id = $1"
        ))
        .bind(code_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_codes_by_member(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<ReferralCode>, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "SELECT {CODE_COLUMNS} FROM referral_codes
             WHERE member_id = $1
             ORDER BY is_primary DESC, created_at ASC"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_primary_code(
        &self,
        member_id: Uuid,
    ) -> Result<Option<ReferralCode>, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "SELECT {CODE_COLUMNS} FROM referral_codes
             WHERE member_id = $1 AND is_primary = true"
        ))
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_code_by_value(&self, value: &str) -> Result<Option<ReferralCode>, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "SELECT {CODE_COLUMNS} FROM referral_codes
             WHERE UPPER(code) = UPPER($1) OR UPPER(custom_code) = UPPER($1)"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_code_by_member_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<ReferralCode>, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            r#"
            SELECT {CODE_COLUMNS} FROM referral_codes
            WHERE is_primary = true
            AND member_id = (
                SELECT id FROM members
                WHERE RIGHT(regexp_replace(COALESCE(phone, ''), '\D', '', 'g'), 10) = $1
                LIMIT 1
            )
            "#
        ))
        .bind(phone_last10)
        .fetch_optional(&self.pool)
        .await
    }

    async fn code_value_exists(&self, value: &str) -> Result<bool, sqlx::Error> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM referral_codes
                WHERE UPPER(code) = UPPER($1) OR UPPER(custom_code) = UPPER($1)
            )
            "#,
        )
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn count_member_codes(&self, member_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM referral_codes WHERE member_id = $1")
                .bind(member_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0)
    }

    async fn save_code(
        &self,
        member_id: Uuid,
        code: &str,
        is_primary: bool,
    ) -> Result<ReferralCode, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "INSERT INTO referral_codes (member_id, code, is_primary)
             VALUES ($1, $2, $3)
             RETURNING {CODE_COLUMNS}"
        ))
        .bind(member_id)
        .bind(code)
        .bind(is_primary)
        .fetch_one(&self.pool)
        .await
    }

    async fn save_custom_code(
        &self,
        member_id: Uuid,
        code: &str,
        custom_code: &str,
    ) -> Result<ReferralCode, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "INSERT INTO referral_codes (member_id, code, custom_code, is_primary)
             VALUES ($1, $2, $3, false)
             RETURNING {CODE_COLUMNS}"
        ))
        .bind(member_id)
        .bind(code)
        .bind(custom_code)
        .fetch_one(&self.pool)
        .await
    }

    async fn record_code_share(&self, code_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE referral_codes SET total_shares = total_shares + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(code_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_code_click(&self, code_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE referral_codes SET total_clicks = total_clicks + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(code_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_code_signup(&self, code_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE referral_codes SET total_signups = total_signups + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(code_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_completed_credit(
        &self,
        code_id: Uuid,
        earned_cents: i64,
    ) -> Result<ReferralCode, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "UPDATE referral_codes
             SET total_completed = total_completed + 1,
                 total_earned_cents = total_earned_cents + $2,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {CODE_COLUMNS}"
        ))
        .bind(code_id)
        .bind(earned_cents)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_code_tier(
        &self,
        code_id: Uuid,
        tier: ReferralTier,
    ) -> Result<ReferralCode, sqlx::Error> {
        sqlx::query_as::<_, ReferralCode>(&format!(
            "UPDATE referral_codes
             SET tier = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {CODE_COLUMNS}"
        ))
        .bind(code_id)
        .bind(tier)
        .fetch_one(&self.pool)
        .await
    }

    async fn save_referral(&self, new_referral: NewReferral) -> Result<Referral, sqlx::Error> {
        let now = Utc::now();
        let (clicked_at, invited_at, claimed_at) = match new_referral.status {
            ReferralStatus::Invited => (None, Some(now), None),
            ReferralStatus::Claimed => (None, None, Some(now)),
            _ => (Some(now), None, None),
        };

        sqlx::query_as::<_, Referral>(&format!(
            "INSERT INTO referrals (
                referral_code_id, referrer_member_id, status,
                referee_first_name, referee_phone, referee_email, referee_device_id,
                channel, location_key, clicked_at, invited_at, claimed_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {REFERRAL_COLUMNS}"
        ))
        .bind(new_referral.referral_code_id)
        .bind(new_referral.referrer_member_id)
        .bind(new_referral.status)
        .bind(new_referral.referee_first_name)
        .bind(new_referral.referee_phone)
        .bind(new_referral.referee_email)
        .bind(new_referral.referee_device_id)
        .bind(new_referral.channel)
        .bind(new_referral.location_key)
        .bind(clicked_at)
        .bind(invited_at)
        .bind(claimed_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn mark_claimed(
        &self,
        referral_id: Uuid,
        referee_phone: Option<&str>,
        referee_email: Option<&str>,
    ) -> Result<Referral, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "UPDATE referrals
             SET status = 'claimed',
                 claimed_at = NOW(),
                 referee_phone = COALESCE($2, referee_phone),
                 referee_email = COALESCE($3, referee_email),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {REFERRAL_COLUMNS}"
        ))
        .bind(referral_id)
        .bind(referee_phone)
        .bind(referee_email)
        .fetch_one(&self.pool)
        .await
    }

    async fn apply_attribution(&self, update: AttributionUpdate) -> Result<Referral, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "UPDATE referrals
             SET status = $2,
                 referee_phone = COALESCE($3, referee_phone),
                 referee_email = COALESCE($4, referee_email),
                 referee_device_id = COALESCE($5, referee_device_id),
                 location_key = COALESCE($6, location_key),
                 external_appointment_id = COALESCE($7, external_appointment_id),
                 referrer_reward_cents = $8,
                 referee_reward_cents = $9,
                 is_self_referral = $10,
                 fraud_flags = $11,
                 booked_at = NOW(),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {REFERRAL_COLUMNS}"
        ))
        .bind(update.referral_id)
        .bind(update.status)
        .bind(update.referee_phone)
        .bind(update.referee_email)
        .bind(update.referee_device_id)
        .bind(update.location_key)
        .bind(update.external_appointment_id)
        .bind(update.referrer_reward_cents)
        .bind(update.referee_reward_cents)
        .bind(update.is_self_referral)
        .bind(update.fraud_flags)
        .fetch_one(&self.pool)
        .await
    }

    async fn mark_fraud_rejected(
        &self,
        referral_id: Uuid,
        fraud_flags: Vec<FraudFlag>,
    ) -> Result<Referral, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "UPDATE referrals
             SET status = 'fraud_rejected',
                 is_self_referral = true,
                 fraud_flags = $2,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {REFERRAL_COLUMNS}"
        ))
        .bind(referral_id)
        .bind(fraud_flags)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_claimed_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals
             WHERE status = 'claimed' AND referee_phone = $1
             ORDER BY claimed_at DESC
             LIMIT 1"
        ))
        .bind(phone_last10)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_pending_by_code_and_device(
        &self,
        code_id: Uuid,
        device_id: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals
             WHERE referral_code_id = $1
             AND referee_device_id = $2
             AND status IN ('clicked', 'claimed')
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(code_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_invited_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals
             WHERE referee_phone = $1
             AND status IN ('invited', 'claimed')
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(phone_last10)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_pending_by_code_and_phone(
        &self,
        code_id: Uuid,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals
             WHERE referral_code_id = $1
             AND referee_phone = $2
             AND status IN ('clicked', 'claimed')
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(code_id)
        .bind(phone_last10)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_recent_pending_by_code(
        &self,
        code_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals
             WHERE referral_code_id = $1
             AND status IN ('clicked', 'claimed')
             AND created_at >= $2
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(code_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
    }

    async fn exists_lifetime_claim_for_phone(
        &self,
        phone_last10: &str,
        exclude_referral_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM referrals
                WHERE referee_phone = $1
                AND status IN ('claimed', 'booked', 'completed', 'credited')
                AND ($2::uuid IS NULL OR id != $2)
            )
            "#,
        )
        .bind(phone_last10)
        .bind(exclude_referral_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn exists_booked_or_later_for_phone(
        &self,
        phone_last10: &str,
        exclude_referral_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM referrals
                WHERE referee_phone = $1
                AND status IN ('booked', 'completed', 'credited')
                AND ($2::uuid IS NULL OR id != $2)
            )
            "#,
        )
        .bind(phone_last10)
        .bind(exclude_referral_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn count_pending_invites(
        &self,
        referrer_member_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM referrals
            WHERE referrer_member_id = $1
            AND status = 'invited'
            AND invited_at >= $2
            "#,
        )
        .bind(referrer_member_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn get_booked_awaiting_credit(&self) -> Result<Vec<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals
             WHERE status = 'booked'
             AND referrer_credit_issued = false
             AND is_self_referral = false
             ORDER BY booked_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn expire_stale_clicks(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE referrals
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'clicked'
            AND clicked_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn link_appointment(
        &self,
        referral_id: Uuid,
        external_appointment_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE referrals SET external_appointment_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(referral_id)
        .bind(external_appointment_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_credited_if_unissued(
        &self,
        referral_id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE referrals
            SET status = 'credited',
                referrer_credit_issued = true,
                completed_at = COALESCE($2, completed_at, NOW()),
                credited_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            AND referrer_credit_issued = false
            "#,
        )
        .bind(referral_id)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_referee_credited_if_unissued(
        &self,
        referral_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE referrals
            SET referee_credit_issued = true, updated_at = NOW()
            WHERE id = $1
            AND referee_credit_issued = false
            "#,
        )
        .bind(referral_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_cancelled(&self, referral_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE referrals
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1
            AND status NOT IN ('credited', 'cancelled', 'expired', 'fraud_rejected')
            "#,
        )
        .bind(referral_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_referral_event(
        &self,
        referral_id: Uuid,
        event_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<ReferralEvent, sqlx::Error> {
        sqlx::query_as::<_, ReferralEvent>(
            r#"
            INSERT INTO referral_events (referral_id, event_type, metadata)
            VALUES ($1, $2, $3)
            RETURNING id, referral_id, event_type, metadata, created_at
            "#,
        )
        .bind(referral_id)
        .bind(event_type)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
    }
}
