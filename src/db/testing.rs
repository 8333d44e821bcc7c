// db/testing.rs
//
// In-memory ReferralStore double for service tests. Mirrors the semantics
// of the SQL layer closely enough that idempotency and uniqueness behavior
// can be exercised without a database.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{
    memberdb::MemberExt,
    referraldb::{AttributionUpdate, NewReferral, ReferralExt},
    syncdb::SyncExt,
};
use crate::models::{
    membermodel::Member,
    referralmodel::{FraudFlag, Referral, ReferralCode, ReferralEvent, ReferralStatus, ReferralTier},
    syncmodels::{SyncedAppointment, SyncedClient},
};
use crate::utils::phone;

#[derive(Default)]
pub struct TestState {
    pub members: Vec<Member>,
    pub codes: Vec<ReferralCode>,
    pub referrals: Vec<Referral>,
    pub appointments: Vec<SyncedAppointment>,
    pub clients: Vec<SyncedClient>,
    pub events: Vec<(Uuid, String)>,
}

#[derive(Default)]
pub struct TestStore {
    pub state: Mutex<TestState>,
    /// When set, the next custom-code insert reports a unique violation,
    /// simulating losing the insert race to another request.
    pub conflict_next_custom_insert: AtomicBool,
    /// When set, the conditional credited update reports zero rows, as if
    /// a concurrent reconciliation run issued the credit first.
    pub credit_already_issued: AtomicBool,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, build: impl FnOnce(&mut TestState)) {
        let mut state = self.state.lock().unwrap();
        build(&mut state);
    }

    pub fn with_state<R>(&self, read: impl FnOnce(&TestState) -> R) -> R {
        let state = self.state.lock().unwrap();
        read(&state)
    }
}

pub fn member(
    first_name: &str,
    phone: Option<&str>,
    email: Option<&str>,
    external_client_id: Option<&str>,
) -> Member {
    Member {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        phone: phone.map(|s| s.to_string()),
        email: email.map(|s| s.to_string()),
        external_client_id: external_client_id.map(|s| s.to_string()),
        created_at: Some(Utc::now()),
    }
}

pub fn code(member_id: Uuid, value: &str) -> ReferralCode {
    ReferralCode {
        id: Uuid::new_v4(),
        member_id,
        code: value.to_string(),
        custom_code: None,
        tier: ReferralTier::Member,
        is_primary: true,
        total_shares: 0,
        total_clicks: 0,
        total_signups: 0,
        total_completed: 0,
        total_earned_cents: 0,
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

pub fn referral(code_id: Uuid, referrer_member_id: Uuid, status: ReferralStatus) -> Referral {
    Referral {
        id: Uuid::new_v4(),
        referral_code_id: code_id,
        referrer_member_id,
        referee_first_name: None,
        referee_phone: None,
        referee_email: None,
        referee_device_id: None,
        status,
        channel: None,
        location_key: None,
        referrer_reward_cents: 0,
        referee_reward_cents: 0,
        is_self_referral: false,
        fraud_flags: Vec::new(),
        clicked_at: Some(Utc::now()),
        invited_at: None,
        claimed_at: None,
        booked_at: None,
        completed_at: None,
        credited_at: None,
        external_appointment_id: None,
        referrer_credit_issued: false,
        referee_credit_issued: false,
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

pub fn appointment(external_id: &str, client_phone: Option<&str>, status: &str) -> SyncedAppointment {
    SyncedAppointment {
        external_id: external_id.to_string(),
        client_phone: client_phone.map(|s| s.to_string()),
        status: status.to_string(),
        location_key: Some("carmel".to_string()),
        completed_at: if status == "completed" { Some(Utc::now()) } else { None },
        updated_at: Some(Utc::now()),
    }
}

pub fn synced_client(external_client_id: &str, phone: &str, visits: i32) -> SyncedClient {
    SyncedClient {
        external_client_id: external_client_id.to_string(),
        phone: Some(phone.to_string()),
        email: None,
        completed_visit_count: visits,
    }
}

#[derive(Debug)]
struct TestDbError(String);

impl std::fmt::Display for TestDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TestDbError {}

impl sqlx::error::DatabaseError for TestDbError {
    fn message(&self) -> &str {
        &self.0
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }
}

fn unique_violation() -> sqlx::Error {
    sqlx::Error::Database(Box::new(TestDbError(
        "duplicate key value violates unique constraint".to_string(),
    )))
}

fn value_taken(codes: &[ReferralCode], value: &str) -> bool {
    codes.iter().any(|c| {
        c.code.eq_ignore_ascii_case(value)
            || c.custom_code
                .as_deref()
                .is_some_and(|custom| custom.eq_ignore_ascii_case(value))
    })
}

fn normalized(raw: &Option<String>) -> String {
    phone::last_ten_digits(raw.as_deref().unwrap_or(""))
}

#[async_trait]
impl ReferralExt for TestStore {
    async fn get_code_by_id(&self, code_id: Uuid) -> Result<Option<ReferralCode>, sqlx::Error> {
        Ok(self.with_state(|s| s.codes.iter().find(|c| c.id == code_id).cloned()))
    }

    async fn get_codes_by_member(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<ReferralCode>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.codes
                .iter()
                .filter(|c| c.member_id == member_id)
                .cloned()
                .collect()
        }))
    }

    async fn get_primary_code(
        &self,
        member_id: Uuid,
    ) -> Result<Option<ReferralCode>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.codes
                .iter()
                .find(|c| c.member_id == member_id && c.is_primary)
                .cloned()
        }))
    }

    async fn find_code_by_value(&self, value: &str) -> Result<Option<ReferralCode>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.codes
                .iter()
                .find(|c| {
                    c.code.eq_ignore_ascii_case(value)
                        || c.custom_code
                            .as_deref()
                            .is_some_and(|custom| custom.eq_ignore_ascii_case(value))
                })
                .cloned()
        }))
    }

    async fn find_code_by_member_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<ReferralCode>, sqlx::Error> {
        Ok(self.with_state(|s| {
            let member_id = s
                .members
                .iter()
                .find(|m| normalized(&m.phone) == phone_last10)
                .map(|m| m.id)?;
            s.codes
                .iter()
                .find(|c| c.member_id == member_id && c.is_primary)
                .cloned()
        }))
    }

    async fn code_value_exists(&self, value: &str) -> Result<bool, sqlx::Error> {
        Ok(self.with_state(|s| value_taken(&s.codes, value)))
    }

    async fn count_member_codes(&self, member_id: Uuid) -> Result<i64, sqlx::Error> {
        Ok(self.with_state(|s| s.codes.iter().filter(|c| c.member_id == member_id).count() as i64))
    }

    async fn save_code(
        &self,
        member_id: Uuid,
        code_value: &str,
        is_primary: bool,
    ) -> Result<ReferralCode, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if value_taken(&state.codes, code_value) {
            return Err(unique_violation());
        }
        let mut row = code(member_id, code_value);
        row.is_primary = is_primary;
        state.codes.push(row.clone());
        Ok(row)
    }

    async fn save_custom_code(
        &self,
        member_id: Uuid,
        code_value: &str,
        custom_code: &str,
    ) -> Result<ReferralCode, sqlx::Error> {
        if self.conflict_next_custom_insert.swap(false, Ordering::SeqCst) {
            return Err(unique_violation());
        }
        let mut state = self.state.lock().unwrap();
        if value_taken(&state.codes, code_value) || value_taken(&state.codes, custom_code) {
            return Err(unique_violation());
        }
        let mut row = code(member_id, code_value);
        row.custom_code = Some(custom_code.to_string());
        row.is_primary = false;
        state.codes.push(row.clone());
        Ok(row)
    }

    async fn record_code_share(&self, code_id: Uuid) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.codes.iter_mut().find(|c| c.id == code_id) {
            code.total_shares += 1;
        }
        Ok(())
    }

    async fn record_code_click(&self, code_id: Uuid) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.codes.iter_mut().find(|c| c.id == code_id) {
            code.total_clicks += 1;
        }
        Ok(())
    }

    async fn record_code_signup(&self, code_id: Uuid) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.codes.iter_mut().find(|c| c.id == code_id) {
            code.total_signups += 1;
        }
        Ok(())
    }

    async fn apply_completed_credit(
        &self,
        code_id: Uuid,
        earned_cents: i64,
    ) -> Result<ReferralCode, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let code = state
            .codes
            .iter_mut()
            .find(|c| c.id == code_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        code.total_completed += 1;
        code.total_earned_cents += earned_cents;
        Ok(code.clone())
    }

    async fn update_code_tier(
        &self,
        code_id: Uuid,
        tier: ReferralTier,
    ) -> Result<ReferralCode, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let code = state
            .codes
            .iter_mut()
            .find(|c| c.id == code_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        code.tier = tier;
        Ok(code.clone())
    }

    async fn save_referral(&self, new_referral: NewReferral) -> Result<Referral, sqlx::Error> {
        let mut row = referral(
            new_referral.referral_code_id,
            new_referral.referrer_member_id,
            new_referral.status,
        );
        let now = Utc::now();
        match new_referral.status {
            ReferralStatus::Invited => {
                row.clicked_at = None;
                row.invited_at = Some(now);
            }
            ReferralStatus::Claimed => {
                row.clicked_at = None;
                row.claimed_at = Some(now);
            }
            _ => row.clicked_at = Some(now),
        }
        row.referee_first_name = new_referral.referee_first_name;
        row.referee_phone = new_referral.referee_phone;
        row.referee_email = new_referral.referee_email;
        row.referee_device_id = new_referral.referee_device_id;
        row.channel = new_referral.channel;
        row.location_key = new_referral.location_key;

        let mut state = self.state.lock().unwrap();
        state.referrals.push(row.clone());
        Ok(row)
    }

    async fn mark_claimed(
        &self,
        referral_id: Uuid,
        referee_phone: Option<&str>,
        referee_email: Option<&str>,
    ) -> Result<Referral, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .referrals
            .iter_mut()
            .find(|r| r.id == referral_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        row.status = ReferralStatus::Claimed;
        row.claimed_at = Some(Utc::now());
        if let Some(phone) = referee_phone {
            row.referee_phone = Some(phone.to_string());
        }
        if let Some(email) = referee_email {
            row.referee_email = Some(email.to_string());
        }
        Ok(row.clone())
    }

    async fn apply_attribution(&self, update: AttributionUpdate) -> Result<Referral, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .referrals
            .iter_mut()
            .find(|r| r.id == update.referral_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        row.status = update.status;
        if update.referee_phone.is_some() {
            row.referee_phone = update.referee_phone;
        }
        if update.referee_email.is_some() {
            row.referee_email = update.referee_email;
        }
        if update.referee_device_id.is_some() {
            row.referee_device_id = update.referee_device_id;
        }
        if update.location_key.is_some() {
            row.location_key = update.location_key;
        }
        if update.external_appointment_id.is_some() {
            row.external_appointment_id = update.external_appointment_id;
        }
        row.referrer_reward_cents = update.referrer_reward_cents;
        row.referee_reward_cents = update.referee_reward_cents;
        row.is_self_referral = update.is_self_referral;
        row.fraud_flags = update.fraud_flags;
        row.booked_at = Some(Utc::now());
        Ok(row.clone())
    }

    async fn mark_fraud_rejected(
        &self,
        referral_id: Uuid,
        fraud_flags: Vec<FraudFlag>,
    ) -> Result<Referral, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .referrals
            .iter_mut()
            .find(|r| r.id == referral_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        row.status = ReferralStatus::FraudRejected;
        row.is_self_referral = true;
        row.fraud_flags = fraud_flags;
        Ok(row.clone())
    }

    async fn find_claimed_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals
                .iter()
                .filter(|r| {
                    r.status == ReferralStatus::Claimed
                        && r.referee_phone.as_deref() == Some(phone_last10)
                })
                .max_by_key(|r| r.claimed_at)
                .cloned()
        }))
    }

    async fn find_pending_by_code_and_device(
        &self,
        code_id: Uuid,
        device_id: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals
                .iter()
                .filter(|r| {
                    r.referral_code_id == code_id
                        && r.referee_device_id.as_deref() == Some(device_id)
                        && matches!(r.status, ReferralStatus::Clicked | ReferralStatus::Claimed)
                })
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn find_invited_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals
                .iter()
                .filter(|r| {
                    r.referee_phone.as_deref() == Some(phone_last10)
                        && matches!(r.status, ReferralStatus::Invited | ReferralStatus::Claimed)
                })
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn find_pending_by_code_and_phone(
        &self,
        code_id: Uuid,
        phone_last10: &str,
    ) -> Result<Option<Referral>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals
                .iter()
                .filter(|r| {
                    r.referral_code_id == code_id
                        && r.referee_phone.as_deref() == Some(phone_last10)
                        && matches!(r.status, ReferralStatus::Clicked | ReferralStatus::Claimed)
                })
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn find_recent_pending_by_code(
        &self,
        code_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<Referral>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals
                .iter()
                .filter(|r| {
                    r.referral_code_id == code_id
                        && matches!(r.status, ReferralStatus::Clicked | ReferralStatus::Claimed)
                        && r.created_at.is_some_and(|at| at >= since)
                })
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn exists_lifetime_claim_for_phone(
        &self,
        phone_last10: &str,
        exclude_referral_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals.iter().any(|r| {
                r.referee_phone.as_deref() == Some(phone_last10)
                    && matches!(
                        r.status,
                        ReferralStatus::Claimed
                            | ReferralStatus::Booked
                            | ReferralStatus::Completed
                            | ReferralStatus::Credited
                    )
                    && exclude_referral_id != Some(r.id)
            })
        }))
    }

    async fn exists_booked_or_later_for_phone(
        &self,
        phone_last10: &str,
        exclude_referral_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals.iter().any(|r| {
                r.referee_phone.as_deref() == Some(phone_last10)
                    && matches!(
                        r.status,
                        ReferralStatus::Booked
                            | ReferralStatus::Completed
                            | ReferralStatus::Credited
                    )
                    && exclude_referral_id != Some(r.id)
            })
        }))
    }

    async fn count_pending_invites(
        &self,
        referrer_member_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals
                .iter()
                .filter(|r| {
                    r.referrer_member_id == referrer_member_id
                        && r.status == ReferralStatus::Invited
                        && r.invited_at.is_some_and(|at| at >= since)
                })
                .count() as i64
        }))
    }

    async fn get_booked_awaiting_credit(&self) -> Result<Vec<Referral>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.referrals
                .iter()
                .filter(|r| {
                    r.status == ReferralStatus::Booked
                        && !r.referrer_credit_issued
                        && !r.is_self_referral
                })
                .cloned()
                .collect()
        }))
    }

    async fn expire_stale_clicks(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let mut expired = 0;
        for row in state.referrals.iter_mut() {
            if row.status == ReferralStatus::Clicked
                && row.clicked_at.is_some_and(|at| at < cutoff)
            {
                row.status = ReferralStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn link_appointment(
        &self,
        referral_id: Uuid,
        external_appointment_id: &str,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.referrals.iter_mut().find(|r| r.id == referral_id) {
            row.external_appointment_id = Some(external_appointment_id.to_string());
        }
        Ok(())
    }

    async fn mark_credited_if_unissued(
        &self,
        referral_id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        if self.credit_already_issued.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut state = self.state.lock().unwrap();
        let Some(row) = state.referrals.iter_mut().find(|r| r.id == referral_id) else {
            return Ok(false);
        };
        if row.referrer_credit_issued {
            return Ok(false);
        }
        row.status = ReferralStatus::Credited;
        row.referrer_credit_issued = true;
        row.completed_at = completed_at.or(row.completed_at).or(Some(Utc::now()));
        row.credited_at = Some(Utc::now());
        Ok(true)
    }

    async fn mark_referee_credited_if_unissued(
        &self,
        referral_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(row) = state.referrals.iter_mut().find(|r| r.id == referral_id) else {
            return Ok(false);
        };
        if row.referee_credit_issued {
            return Ok(false);
        }
        row.referee_credit_issued = true;
        Ok(true)
    }

    async fn mark_cancelled(&self, referral_id: Uuid) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.referrals.iter_mut().find(|r| r.id == referral_id) {
            if !row.status.is_terminal() {
                row.status = ReferralStatus::Cancelled;
            }
        }
        Ok(())
    }

    async fn insert_referral_event(
        &self,
        referral_id: Uuid,
        event_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<ReferralEvent, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.events.push((referral_id, event_type.to_string()));
        Ok(ReferralEvent {
            id: Uuid::new_v4(),
            referral_id,
            event_type: event_type.to_string(),
            metadata,
            created_at: Some(Utc::now()),
        })
    }
}

#[async_trait]
impl MemberExt for TestStore {
    async fn get_member(&self, member_id: Uuid) -> Result<Option<Member>, sqlx::Error> {
        Ok(self.with_state(|s| s.members.iter().find(|m| m.id == member_id).cloned()))
    }

    async fn get_member_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Member>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.members
                .iter()
                .find(|m| normalized(&m.phone) == phone_last10)
                .cloned()
        }))
    }

    async fn link_member_external_client(
        &self,
        member_id: Uuid,
        external_client_id: &str,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(member) = state.members.iter_mut().find(|m| m.id == member_id) {
            member.external_client_id = Some(external_client_id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl SyncExt for TestStore {
    async fn get_synced_appointment(
        &self,
        external_id: &str,
    ) -> Result<Option<SyncedAppointment>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.appointments
                .iter()
                .find(|a| a.external_id == external_id)
                .cloned()
        }))
    }

    async fn find_appointment_by_phone(
        &self,
        phone_last10: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<SyncedAppointment>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.appointments
                .iter()
                .filter(|a| {
                    normalized(&a.client_phone) == phone_last10
                        && a.updated_at.is_some_and(|at| at >= since)
                })
                .max_by_key(|a| a.updated_at)
                .cloned()
        }))
    }

    async fn get_synced_client_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<SyncedClient>, sqlx::Error> {
        Ok(self.with_state(|s| {
            s.clients
                .iter()
                .find(|c| normalized(&c.phone) == phone_last10)
                .cloned()
        }))
    }
}
