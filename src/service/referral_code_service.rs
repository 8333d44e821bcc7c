// service/referral_code_service.rs
use std::sync::Arc;

use rand::{distr::Alphanumeric, Rng};
use uuid::Uuid;

use crate::{
    db::{db::ReferralStore, memberdb::MemberExt, referraldb::ReferralExt},
    models::referralmodel::{ReferralCode, ReferralTier},
    service::error::ServiceError,
    utils::phone,
};

pub const MAX_CODES_PER_MEMBER: usize = 5;
pub const CUSTOM_CODE_MIN_LEN: usize = 3;
pub const CUSTOM_CODE_MAX_LEN: usize = 20;

const CODE_GENERATION_ATTEMPTS: usize = 10;
const NAME_BASED_ATTEMPTS: usize = 5;

/// Tier thresholds and reward amounts. Loaded once and injected; reward
/// values never live inline in the pipeline code.
#[derive(Debug, Clone)]
pub struct TierRule {
    pub tier: ReferralTier,
    pub min_completed: i32,
    pub referrer_reward_cents: i64,
    /// One-time bonus issued on entering this tier.
    pub milestone_bonus_cents: i64,
}

#[derive(Debug, Clone)]
pub struct RewardSchedule {
    /// Ascending by min_completed.
    pub tiers: Vec<TierRule>,
    pub referee_reward_cents: i64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        RewardSchedule {
            tiers: vec![
                TierRule {
                    tier: ReferralTier::Member,
                    min_completed: 0,
                    referrer_reward_cents: 2500,
                    milestone_bonus_cents: 0,
                },
                TierRule {
                    tier: ReferralTier::Advocate,
                    min_completed: 5,
                    referrer_reward_cents: 3500,
                    milestone_bonus_cents: 5000,
                },
                TierRule {
                    tier: ReferralTier::Champion,
                    min_completed: 15,
                    referrer_reward_cents: 5000,
                    milestone_bonus_cents: 10000,
                },
            ],
            referee_reward_cents: 1000,
        }
    }
}

impl RewardSchedule {
    /// Pure, monotonic mapping from cumulative completed count to tier.
    pub fn compute_tier(&self, completed_count: i32) -> ReferralTier {
        let mut current = self.tiers[0].tier;
        for rule in &self.tiers {
            if completed_count >= rule.min_completed {
                current = rule.tier;
            }
        }
        current
    }

    pub fn referrer_reward_cents(&self, tier: ReferralTier) -> i64 {
        self.tiers
            .iter()
            .find(|rule| rule.tier == tier)
            .map(|rule| rule.referrer_reward_cents)
            .unwrap_or(self.tiers[0].referrer_reward_cents)
    }

    /// Bonus owed when a code moves between tiers; zero-bonus tiers yield
    /// None so no event fires.
    pub fn milestone_bonus_cents(&self, from: ReferralTier, to: ReferralTier) -> Option<i64> {
        if from == to {
            return None;
        }
        self.tiers
            .iter()
            .find(|rule| rule.tier == to)
            .filter(|rule| rule.milestone_bonus_cents > 0)
            .map(|rule| rule.milestone_bonus_cents)
    }
}

pub fn generate_referral_link(base_url: &str, code: &str) -> String {
    format!("{}/refer?code={}", base_url, code)
}

fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Uppercase alphanumeric-plus-hyphen, clamped to the maximum length.
pub fn sanitize_custom_code(requested: &str) -> String {
    requested
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(CUSTOM_CODE_MAX_LEN)
        .collect()
}

#[derive(Clone)]
pub struct ReferralCodeService {
    db_client: Arc<dyn ReferralStore>,
    schedule: Arc<RewardSchedule>,
}

impl ReferralCodeService {
    pub fn new(db_client: Arc<dyn ReferralStore>, schedule: Arc<RewardSchedule>) -> Self {
        Self {
            db_client,
            schedule,
        }
    }

    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    /// Resolve a system code, a custom code, or a bare phone number shared
    /// as an informal code.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<ReferralCode>, ServiceError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(None);
        }

        if phone::looks_like_phone(identifier) {
            let last10 = phone::last_ten_digits(identifier);
            return Ok(self.db_client.find_code_by_member_phone(&last10).await?);
        }

        Ok(self.db_client.find_code_by_value(identifier).await?)
    }

    /// Return the member's primary code, generating one on first read.
    pub async fn get_or_create_primary(
        &self,
        member_id: Uuid,
    ) -> Result<ReferralCode, ServiceError> {
        if let Some(code) = self.db_client.get_primary_code(member_id).await? {
            return Ok(code);
        }

        let member = self
            .db_client
            .get_member(member_id)
            .await?
            .ok_or(ServiceError::MemberNotFound(member_id))?;

        let name_stem: String = member
            .first_name
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(12)
            .collect();

        for attempt in 0..CODE_GENERATION_ATTEMPTS {
            // Name-based first; after repeated collisions fall back to a
            // fully random code.
            let candidate = if attempt < NAME_BASED_ATTEMPTS && !name_stem.is_empty() {
                format!("{}{}", name_stem, random_suffix(3))
            } else {
                random_suffix(8)
            };

            if self.db_client.code_value_exists(&candidate).await? {
                continue;
            }

            match self.db_client.save_code(member_id, &candidate, true).await {
                Ok(code) => return Ok(code),
                // The insert is the authority; a race between the existence
                // check and the insert shows up here as a unique violation.
                Err(err) if is_unique_violation(&err) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        tracing::error!(
            "referral code generation exhausted {} attempts for member {}",
            CODE_GENERATION_ATTEMPTS,
            member_id
        );
        Err(ServiceError::CodeGenerationExhausted)
    }

    /// Add a vanity code, up to the per-member cap.
    pub async fn add_custom_code(
        &self,
        member_id: Uuid,
        requested: &str,
    ) -> Result<ReferralCode, ServiceError> {
        let sanitized = sanitize_custom_code(requested);
        if sanitized.len() < CUSTOM_CODE_MIN_LEN {
            return Err(ServiceError::CustomCodeTooShort);
        }

        let held = self.db_client.count_member_codes(member_id).await?;
        if held as usize >= MAX_CODES_PER_MEMBER {
            return Err(ServiceError::CodeLimitReached(MAX_CODES_PER_MEMBER));
        }

        if self.db_client.code_value_exists(&sanitized).await? {
            return Err(ServiceError::CodeAlreadyTaken);
        }

        // Custom codes ride on their own non-primary code row so each can
        // accumulate counters independently. One insert carries both values;
        // losing the race to another request aborts without leaving a row,
        // so the member's code slot is not consumed.
        let generated = random_suffix(8);
        match self
            .db_client
            .save_custom_code(member_id, &generated, &sanitized)
            .await
        {
            Ok(code) => Ok(code),
            Err(err) if is_unique_violation(&err) => Err(ServiceError::CodeAlreadyTaken),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn record_share(&self, code_id: Uuid) -> Result<(), ServiceError> {
        self.db_client.record_code_share(code_id).await?;
        Ok(())
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
