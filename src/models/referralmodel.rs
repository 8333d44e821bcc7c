use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "referral_tier", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralTier {
    Member,
    Advocate,
    Champion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "referral_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Clicked,
    Invited,
    Claimed,
    Booked,
    Completed,
    Credited,
    Cancelled,
    Expired,
    FraudRejected,
}

impl Default for ReferralStatus {
    fn default() -> Self {
        ReferralStatus::Clicked
    }
}

impl ReferralStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReferralStatus::Credited
                | ReferralStatus::Cancelled
                | ReferralStatus::Expired
                | ReferralStatus::FraudRejected
        )
    }

    /// Funnel position used to enforce monotonic progress. Entry states
    /// (clicked / invited) share a rank.
    fn rank(&self) -> u8 {
        match self {
            ReferralStatus::Clicked | ReferralStatus::Invited => 0,
            ReferralStatus::Claimed => 1,
            ReferralStatus::Booked => 2,
            ReferralStatus::Completed => 3,
            ReferralStatus::Credited => 4,
            // Terminal side-branches sit above every pre-credited state.
            ReferralStatus::Cancelled | ReferralStatus::Expired | ReferralStatus::FraudRejected => {
                5
            }
        }
    }

    pub fn can_transition_to(&self, to: ReferralStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            // Side-branches are reachable from any pre-credited state.
            ReferralStatus::Cancelled | ReferralStatus::Expired | ReferralStatus::FraudRejected => {
                true
            }
            _ => to.rank() > self.rank(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fraud_flag", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FraudFlag {
    SelfReferralPhone,
    SelfReferralEmail,
    ExistingClient,
    DuplicatePhone,
}

impl FraudFlag {
    pub fn is_self_referral(&self) -> bool {
        matches!(
            self,
            FraudFlag::SelfReferralPhone | FraudFlag::SelfReferralEmail
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct ReferralCode {
    pub id: Uuid,
    pub member_id: Uuid,
    pub code: String,
    pub custom_code: Option<String>,
    pub tier: ReferralTier,
    pub is_primary: bool,
    pub total_shares: i32,
    pub total_clicks: i32,
    pub total_signups: i32,
    pub total_completed: i32,
    pub total_earned_cents: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct Referral {
    pub id: Uuid,
    pub referral_code_id: Uuid,
    pub referrer_member_id: Uuid,
    pub referee_first_name: Option<String>,
    pub referee_phone: Option<String>,
    pub referee_email: Option<String>,
    pub referee_device_id: Option<String>,
    pub status: ReferralStatus,
    pub channel: Option<String>,
    pub location_key: Option<String>,
    pub referrer_reward_cents: i64,
    pub referee_reward_cents: i64,
    pub is_self_referral: bool,
    pub fraud_flags: Vec<FraudFlag>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub invited_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub booked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub credited_at: Option<DateTime<Utc>>,
    pub external_appointment_id: Option<String>,
    pub referrer_credit_issued: bool,
    pub referee_credit_issued: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct ReferralEvent {
    pub id: Uuid,
    pub referral_id: Uuid,
    pub event_type: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReferralStats {
    pub total_shares: i64,
    pub total_clicks: i64,
    pub total_signups: i64,
    pub total_completed: i64,
    pub total_earned_cents: i64,
    pub tier: ReferralTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(ReferralStatus::Clicked.can_transition_to(ReferralStatus::Claimed));
        assert!(ReferralStatus::Invited.can_transition_to(ReferralStatus::Booked));
        assert!(ReferralStatus::Claimed.can_transition_to(ReferralStatus::Booked));
        assert!(ReferralStatus::Booked.can_transition_to(ReferralStatus::Credited));
    }

    #[test]
    fn test_regression_rejected() {
        assert!(!ReferralStatus::Credited.can_transition_to(ReferralStatus::Booked));
        assert!(!ReferralStatus::Booked.can_transition_to(ReferralStatus::Claimed));
        assert!(!ReferralStatus::Booked.can_transition_to(ReferralStatus::Booked));
    }

    #[test]
    fn test_side_branches_reachable_pre_credit() {
        assert!(ReferralStatus::Clicked.can_transition_to(ReferralStatus::Expired));
        assert!(ReferralStatus::Claimed.can_transition_to(ReferralStatus::FraudRejected));
        assert!(ReferralStatus::Booked.can_transition_to(ReferralStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!ReferralStatus::Credited.can_transition_to(ReferralStatus::Cancelled));
        assert!(!ReferralStatus::FraudRejected.can_transition_to(ReferralStatus::Booked));
        assert!(!ReferralStatus::Expired.can_transition_to(ReferralStatus::Claimed));
    }
}
