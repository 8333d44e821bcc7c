// service/fraud.rs
//
// Heuristics run synchronously at attribution time, before the booked
// transition is persisted. The verdict carries every matched flag so a
// reviewer sees the full trail, not a collapsed boolean.
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{db::ReferralStore, referraldb::ReferralExt, syncdb::SyncExt},
    models::{membermodel::Member, referralmodel::FraudFlag},
    service::error::ServiceError,
    utils::phone,
};

/// Referees with this many completed visits on file are flagged as existing
/// clients (flag only; referrer credit stays eligible).
const EXISTING_CLIENT_VISIT_THRESHOLD: i32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct FraudVerdict {
    pub flags: Vec<FraudFlag>,
}

impl FraudVerdict {
    pub fn is_self_referral(&self) -> bool {
        self.flags.iter().any(|flag| flag.is_self_referral())
    }

    /// Only duplicate_phone blocks the referee-side credit. existing_client
    /// is informational and never blocks on its own.
    pub fn blocks_referee_credit(&self) -> bool {
        self.is_self_referral() || self.flags.contains(&FraudFlag::DuplicatePhone)
    }
}

/// Self-referral detection is pure: phone match on the last 10 digits, or a
/// case-insensitive email match, against the referrer's contact on file.
pub fn self_referral_flags(
    referrer: &Member,
    referee_phone: Option<&str>,
    referee_email: Option<&str>,
) -> Vec<FraudFlag> {
    let mut flags = Vec::new();

    if let (Some(referrer_phone), Some(referee_phone)) = (referrer.phone.as_deref(), referee_phone)
    {
        if phone::same_phone(referrer_phone, referee_phone) {
            flags.push(FraudFlag::SelfReferralPhone);
        }
    }

    if let (Some(referrer_email), Some(referee_email)) = (referrer.email.as_deref(), referee_email)
    {
        if !referrer_email.is_empty() && referrer_email.eq_ignore_ascii_case(referee_email) {
            flags.push(FraudFlag::SelfReferralEmail);
        }
    }

    flags
}

#[derive(Clone)]
pub struct FraudEvaluator {
    db_client: Arc<dyn ReferralStore>,
}

impl FraudEvaluator {
    pub fn new(db_client: Arc<dyn ReferralStore>) -> Self {
        Self { db_client }
    }

    pub async fn evaluate(
        &self,
        referral_id: Uuid,
        referrer: &Member,
        referee_phone: Option<&str>,
        referee_email: Option<&str>,
    ) -> Result<FraudVerdict, ServiceError> {
        let mut flags = self_referral_flags(referrer, referee_phone, referee_email);

        if let Some(referee_phone) = referee_phone {
            let last10 = phone::last_ten_digits(referee_phone);

            if let Some(client) = self.db_client.get_synced_client_by_phone(&last10).await? {
                if client.completed_visit_count >= EXISTING_CLIENT_VISIT_THRESHOLD {
                    flags.push(FraudFlag::ExistingClient);
                }
            }

            if self
                .db_client
                .exists_booked_or_later_for_phone(&last10, Some(referral_id))
                .await?
            {
                flags.push(FraudFlag::DuplicatePhone);
            }
        }

        Ok(FraudVerdict { flags })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(phone: Option<&str>, email: Option<&str>) -> Member {
        Member {
            id: Uuid::new_v4(),
            first_name: "Krista".to_string(),
            phone: phone.map(|s| s.to_string()),
            email: email.map(|s| s.to_string()),
            external_client_id: None,
            created_at: None,
        }
    }

    #[test]
    fn test_self_referral_by_phone_last_ten() {
        let referrer = member(Some("+1 (317) 555-0123"), None);
        let flags = self_referral_flags(&referrer, Some("3175550123"), None);
        assert_eq!(flags, vec![FraudFlag::SelfReferralPhone]);
    }

    #[test]
    fn test_self_referral_by_email_case_insensitive() {
        let referrer = member(None, Some("Krista@Example.com"));
        let flags = self_referral_flags(&referrer, None, Some("krista@example.com"));
        assert_eq!(flags, vec![FraudFlag::SelfReferralEmail]);
    }

    #[test]
    fn test_both_contacts_match_yields_both_flags() {
        let referrer = member(Some("3175550123"), Some("k@example.com"));
        let flags = self_referral_flags(&referrer, Some("13175550123"), Some("K@EXAMPLE.COM"));
        assert_eq!(
            flags,
            vec![FraudFlag::SelfReferralPhone, FraudFlag::SelfReferralEmail]
        );
    }

    #[test]
    fn test_distinct_contacts_clean() {
        let referrer = member(Some("3175550123"), Some("k@example.com"));
        let flags = self_referral_flags(&referrer, Some("3175550999"), Some("friend@example.com"));
        assert!(flags.is_empty());
    }

    #[test]
    fn test_verdict_blocking_rules() {
        let self_ref = FraudVerdict {
            flags: vec![FraudFlag::SelfReferralPhone],
        };
        assert!(self_ref.is_self_referral());
        assert!(self_ref.blocks_referee_credit());

        let existing_only = FraudVerdict {
            flags: vec![FraudFlag::ExistingClient],
        };
        assert!(!existing_only.is_self_referral());
        assert!(!existing_only.blocks_referee_credit());

        let duplicate = FraudVerdict {
            flags: vec![FraudFlag::ExistingClient, FraudFlag::DuplicatePhone],
        };
        assert!(!duplicate.is_self_referral());
        assert!(duplicate.blocks_referee_credit());
    }
}
